use std::{env, env::VarError};

/// Prints the help text and the current configuration if any argument was given.
///
/// Returns true if the help was printed, in which case the caller should exit.
pub fn handle_command_line_args() -> bool {
    let wants_help = env::args().nth(1).is_some();
    if wants_help {
        display_readme();
        display_envs();
    }
    wants_help
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Secrets are deliberately absent from this list
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "SFS_HOST",
        "SFS_PORT",
        "SFS_DATABASE_URL",
        "SFS_GATEWAY_TIMEOUT_SECS",
        "SFS_POLL_INTERVAL_SECS",
        "SFS_DISABLE_POLLING",
        "SFS_MOCK_GATEWAY_URL",
        "SFS_MOCK_GATEWAY_POLLING",
        "SFS_NOTIFY_URL",
    ];

    println!("Current configuration (secrets omitted):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
