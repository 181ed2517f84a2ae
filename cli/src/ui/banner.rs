//! Banner and header printing.

use borderlink_core::Config;

/// Print the application banner.
pub fn print_banner() {
    println!("\n\x1b[1;36m╔══════════════════════════════════════╗\x1b[0m");
    println!("\x1b[1;36m║\x1b[0m         \x1b[1mBorderlink\x1b[0m                   \x1b[1;36m║\x1b[0m");
    println!("\x1b[1;36m║\x1b[0m     Lockstep grid border exchange    \x1b[1;36m║\x1b[0m");
    println!("\x1b[1;36m╚══════════════════════════════════════╝\x1b[0m\n");
}

/// Print who this peer is and where it talks.
pub fn print_session(config: &Config) {
    let width = config.grid_width;
    println!("\x1b[1mRole:\x1b[0m     {}", config.role);
    println!("\x1b[1mGrid:\x1b[0m     {}x{}", width, config.grid_height);
    println!("\x1b[1mListen:\x1b[0m   {}", config.local_endpoint());
    println!("\x1b[1mPeer:\x1b[0m     {}", config.remote_endpoint());
    match config.source_endpoint() {
        Some(source) => println!("\x1b[1mSource:\x1b[0m   {}", source),
        None => println!("\x1b[1mSource:\x1b[0m   (any port)"),
    }
    println!(
        "\x1b[1mColumns:\x1b[0m  send {}, receive {}",
        config.role.send_column(width),
        config.role.receive_column(width)
    );
}
