use blockharvest_browser::list_available_browsers;
use blockharvest_core::config::{Credentials, EMAIL_ENV, PASSWORD_ENV};
use blockharvest_core::{AuthMode, Config, Paths};
use std::path::{Path, PathBuf};

/// Check everything a scrape needs before launching one.
pub async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config_file = config_path.unwrap_or_else(|| paths.config_file());

    println!();
    println!("🩺 blockharvest doctor");
    println!("================================");
    println!();

    let mut ok_count = 0u32;
    let mut warn_count = 0u32;
    let mut err_count = 0u32;

    // --- Config ---
    println!("📋 Configuration");
    let config = if config_file.exists() {
        match Config::load(&config_file) {
            Ok(config) => {
                print_ok("Config file parses", &config_file.display().to_string());
                ok_count += 1;
                config
            }
            Err(e) => {
                print_err("Config file is invalid", &e.to_string());
                err_count += 1;
                Config::default()
            }
        }
    } else {
        print_warn(
            "No config file, using defaults",
            "Run `blockharvest config init` to create one",
        );
        warn_count += 1;
        Config::default()
    };
    match config.validate() {
        Ok(()) => {
            print_ok("Settings are consistent", "");
            ok_count += 1;
        }
        Err(e) => {
            print_err("Settings rejected", &e.to_string());
            err_count += 1;
        }
    }
    println!();

    // --- Browser ---
    println!("🌐 Browser");
    match &config.browser.executable {
        Some(path) if Path::new(path).exists() => {
            print_ok("Configured browser found", path);
            ok_count += 1;
        }
        Some(path) => {
            print_err("Configured browser not found", path);
            err_count += 1;
        }
        None => {
            let browsers = list_available_browsers();
            if browsers.is_empty() {
                print_err(
                    "No Chrome, Chromium or Edge found",
                    "Install one or set browser.executable",
                );
                err_count += 1;
            }
            for (engine, path) in browsers {
                print_ok(&format!("{} available", engine.name()), &path);
                ok_count += 1;
            }
        }
    }
    println!();

    // --- Output ---
    println!("📁 Output");
    let output = config.output_layout();
    match check_writable(output.base()) {
        Ok(_) if output.base().is_dir() => {
            print_ok("Output directory writable", &output.base().display().to_string());
            ok_count += 1;
        }
        Ok(checked) => {
            print_ok(
                "Output directory can be created",
                &format!("{} (under {})", output.base().display(), checked.display()),
            );
            ok_count += 1;
        }
        Err(e) => {
            print_err("Output directory not writable", &e.to_string());
            err_count += 1;
        }
    }
    println!();

    // --- Login ---
    println!("🔑 Login");
    match (config.auth.mode, Credentials::from_env()) {
        (AuthMode::Interactive, _) => {
            print_ok("Interactive login", "sign in through the browser window");
            ok_count += 1;
        }
        (AuthMode::Auto, None) => {
            print_warn(
                "Credentials not set, will fall back to interactive login",
                &format!("Set {} and {} to sign in automatically", EMAIL_ENV, PASSWORD_ENV),
            );
            warn_count += 1;
        }
        (AuthMode::Auto | AuthMode::Credentials, Some(creds)) => {
            print_ok("Credentials present", &creds.email);
            ok_count += 1;
        }
        (AuthMode::Credentials, None) => {
            print_err(
                "Credentials missing",
                &format!("Set {} and {}, or use --interactive", EMAIL_ENV, PASSWORD_ENV),
            );
            err_count += 1;
        }
    }
    println!();

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "  ✅ {} passed  ⚠️  {} warnings  ❌ {} errors",
        ok_count, warn_count, err_count
    );
    if err_count > 0 {
        println!();
        println!("  {} error(s) must be fixed before scraping.", err_count);
    }
    println!();

    Ok(())
}

/// Write a scratch file into `dir`, or into its nearest existing ancestor when
/// `dir` is not there yet. Nothing is created. Returns the directory checked.
fn check_writable(dir: &Path) -> std::io::Result<PathBuf> {
    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };
    let existing = absolute
        .ancestors()
        .find(|p| p.exists())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no existing ancestor"))?;
    if !existing.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("{} is not a directory", existing.display()),
        ));
    }
    let scratch = existing.join(".doctor_test");
    std::fs::write(&scratch, "test")?;
    std::fs::remove_file(&scratch)?;
    Ok(existing.to_path_buf())
}

fn print_ok(label: &str, detail: &str) {
    if detail.is_empty() {
        println!("  ✅ {}", label);
    } else {
        println!("  ✅ {} — {}", label, detail);
    }
}

fn print_warn(label: &str, hint: &str) {
    if hint.is_empty() {
        println!("  ⚠️  {}", label);
    } else {
        println!("  ⚠️  {} — {}", label, hint);
    }
}

fn print_err(label: &str, hint: &str) {
    if hint.is_empty() {
        println!("  ❌ {}", label);
    } else {
        println!("  ❌ {} — {}", label, hint);
    }
}
