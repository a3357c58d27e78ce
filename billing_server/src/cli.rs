use std::{env, env::VarError};

/// The server takes no arguments. Any argument prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Secrets (VB_ADMIN_API_KEY, VB_STRIPE_WEBHOOK_SECRET, VB_STRIPE_API_KEY) are never listed
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "VB_HOST",
        "VB_PORT",
        "VB_DATABASE_URL",
        "VB_DB_MAX_CONNECTIONS",
        "VB_WEBHOOK_TOLERANCE",
        "VB_REFUND_TIMEOUT",
        "VB_REFUND_RETRIES",
        "VB_EVENT_RETENTION_DAYS",
        "VB_TRIAL_DAYS",
        "VB_STRIPE_API_BASE",
        "VB_STRIPE_REQUEST_TIMEOUT",
        "VB_CURRENCY",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
