//! Info command implementation.

use borderlink_core::Config;

use crate::ui::print_session;

/// Display the resolved session configuration.
pub fn show_info(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("\n\x1b[1mBorderlink Session Info\x1b[0m");
    println!("═══════════════════════════════════════");
    print_session(config);

    let policy = config.retry_policy();
    println!(
        "\x1b[1mConnect:\x1b[0m  {} attempt(s), {:?} apart",
        policy.max_attempts, policy.interval
    );
    println!(
        "\x1b[1mTimeouts:\x1b[0m handshake {:?}, read {:?}",
        config.handshake_timeout(),
        config.read_timeout()
    );
    match config.max_steps {
        Some(steps) => println!("\x1b[1mSteps:\x1b[0m    {}", steps),
        None => println!("\x1b[1mSteps:\x1b[0m    until stopped"),
    }
    println!();
    Ok(())
}
