use clap_complete::{generate, Shell};

/// Generate shell completion scripts.
///
/// Uses a hand-built command tree so this module does not depend on the `Cli` in main.
pub async fn run(shell: &str) -> anyhow::Result<()> {
    let shell = match shell.to_lowercase().as_str() {
        "bash" => Shell::Bash,
        "zsh" => Shell::Zsh,
        "fish" => Shell::Fish,
        "powershell" | "ps" => Shell::PowerShell,
        "elvish" => Shell::Elvish,
        _ => {
            anyhow::bail!(
                "Unsupported shell: {}. Options: bash, zsh, fish, powershell, elvish",
                shell
            );
        }
    };

    let mut cmd = build_cli();
    generate(shell, &mut cmd, "blockharvest", &mut std::io::stdout());

    eprintln!();
    eprintln!("# Usage:");
    match shell {
        Shell::Bash => {
            eprintln!("#   eval \"$(blockharvest completions bash)\"");
        }
        Shell::Zsh => {
            eprintln!("#   blockharvest completions zsh > ~/.zfunc/_blockharvest");
        }
        Shell::Fish => {
            eprintln!("#   blockharvest completions fish > ~/.config/fish/completions/blockharvest.fish");
        }
        _ => {}
    }

    Ok(())
}

fn build_cli() -> clap::Command {
    use clap::{Arg, ArgAction, Command};

    let flag = |name: &'static str| Arg::new(name).long(name).action(ArgAction::SetTrue);
    let value = |name: &'static str| Arg::new(name).long(name).num_args(1);

    Command::new("blockharvest")
        .about("Harvest Tailwind Plus UI blocks")
        .arg(Arg::new("verbose").short('v').long("verbose").action(ArgAction::SetTrue).global(true))
        .subcommand(
            Command::new("scrape")
                .about("Log in, walk the component listing and write the manifest")
                .arg(value("config"))
                .arg(value("output"))
                .arg(flag("interactive"))
                .arg(flag("headless"))
                .arg(value("browser"))
                .arg(value("framework-mapping").value_parser(["label", "position"])),
        )
        .subcommand(
            Command::new("doctor")
                .about("Run environment diagnostics")
                .arg(value("config")),
        )
        .subcommand(
            Command::new("config")
                .about("Manage configuration")
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("init").about("Write a default config file").arg(flag("force")))
                .subcommand(Command::new("path").about("Print the config file location"))
                .subcommand(Command::new("get").about("Get a config value"))
                .subcommand(Command::new("set").about("Set a config value")),
        )
        .subcommand(Command::new("completions").about("Generate shell completion scripts"))
}
