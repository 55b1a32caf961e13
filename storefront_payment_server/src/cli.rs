use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 20] = [
        "RUST_LOG",
        "SPG_HOST",
        "SPG_PORT",
        "SPG_DATABASE_URL",
        "SPG_DATABASE_MAX_CONNECTIONS",
        "SPG_GATEWAY_PRODUCTION",
        "SPG_GATEWAY_TIMEOUT_SECS",
        "SPG_GATEWAY_HMAC_CHECKS",
        "SPG_GATEWAY_SIGNATURE_HEADER",
        "SPG_GATEWAY_IP_WHITELIST",
        "SPG_USE_X_FORWARDED_FOR",
        "SPG_USE_FORWARDED",
        "SPG_FINISH_URL",
        "SPG_ERROR_URL",
        "SPG_PENDING_URL",
        "SPG_AMOUNT_TOLERANCE",
        "SPG_STALE_SESSION_HOURS",
        "SPG_CURRENCY",
        "SPG_GATEWAY_SNAP_URL",
        "SPG_GATEWAY_API_URL",
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
