//! Command-line surface: device, attendance, user, finger, and backup
//! subcommands, plus the `serve`, `status`, `test-connection`,
//! `init-check`, and `list` utility commands. Mirrors the source
//! implementation's Typer CLI command-for-command.

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use comfy_table::Table;

use crate::cache::AttendanceCache;
use crate::config::Settings;
use crate::domain::{attendance, backup, device_manager, fingerprint, user_sync};
use crate::error::Result;
use crate::hris::HrisClient;
use crate::pool::DevicePool;
use crate::storage::S3Client;

#[derive(Parser, Debug)]
#[command(name = "fingerprint-ctl", about = "Biometric terminal fleet middleware")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API server.
    Serve,
    /// Print the loaded configuration.
    Status,
    /// Verify connectivity to every configured device and peripheral.
    TestConnection,
    /// Retry `test-connection` until it succeeds or attempts are exhausted.
    InitCheck {
        #[arg(long, default_value_t = 5)]
        attempts: u32,
        #[arg(long, default_value_t = 5)]
        delay_seconds: u64,
    },
    /// List every available command.
    List,
    #[command(subcommand)]
    Device(DeviceCommand),
    #[command(subcommand)]
    Attendance(AttendanceCommand),
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Finger(FingerCommand),
    #[command(subcommand)]
    Backup(BackupCommand),
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommand {
    List,
    Status { device: String },
    Restart { device: String, #[arg(long)] confirm: bool },
    Time { device: String },
    SyncTime { device: String },
}

#[derive(Subcommand, Debug)]
pub enum AttendanceCommand {
    List {
        device: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    Count { device: String },
    Clear { device: String, #[arg(long)] confirm: bool },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    List { device: String },
    Add(AddUserArgs),
    Delete { device: String, uid: u32, #[arg(long)] confirm: bool },
    Sync {
        device: String,
        #[arg(long, default_value_t = true)]
        dry_run: bool,
    },
}

#[derive(Args, Debug)]
pub struct AddUserArgs {
    pub device: String,
    pub uid: u32,
    pub user_id: String,
    #[arg(long, default_value = "")]
    pub name: String,
}

#[derive(Subcommand, Debug)]
pub enum FingerCommand {
    List { device: String, user_id: Option<String> },
    Count { device: String },
}

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    Run { device: String },
    List { device: Option<String> },
    Restore {
        s3_key: String,
        #[arg(long)]
        target_device: Option<String>,
        #[arg(long, default_value_t = true)]
        dry_run: bool,
        #[arg(long)]
        confirm: bool,
    },
}

pub struct CliContext {
    pub settings: Arc<Settings>,
    pub pool: Arc<DevicePool>,
    pub cache: Arc<AttendanceCache>,
    pub s3: Option<Arc<S3Client>>,
    pub hris: Option<Arc<HrisClient>>,
}

fn require_confirm(confirm: bool, what: &str) -> Result<()> {
    if !confirm {
        return Err(crate::error::FingerprintError::InvalidConfig(format!(
            "refusing to {what} without --confirm"
        )));
    }
    Ok(())
}

pub async fn dispatch(command: Command, ctx: CliContext) -> Result<()> {
    match command {
        Command::Serve => unreachable!("serve is handled by main before dispatch"),
        Command::Status => {
            print_status(&ctx);
            Ok(())
        }
        Command::TestConnection => test_connection(&ctx).await,
        Command::InitCheck {
            attempts,
            delay_seconds,
        } => init_check(&ctx, attempts, delay_seconds).await,
        Command::List => {
            print_command_list();
            Ok(())
        }
        Command::Device(cmd) => device_command(cmd, &ctx).await,
        Command::Attendance(cmd) => attendance_command(cmd, &ctx).await,
        Command::User(cmd) => user_command(cmd, &ctx).await,
        Command::Finger(cmd) => finger_command(cmd, &ctx).await,
        Command::Backup(cmd) => backup_command(cmd, &ctx).await,
    }
}

async fn device_command(cmd: DeviceCommand, ctx: &CliContext) -> Result<()> {
    match cmd {
        DeviceCommand::List => {
            for config in device_manager::list_devices(&ctx.pool) {
                println!("{}\t{}\t{}:{}", config.name, config.model, config.ip, config.port);
            }
            Ok(())
        }
        DeviceCommand::Status { device } => {
            let status = device_manager::get_device_status(&ctx.pool, &device).await?;
            println!("{:#?}", status);
            Ok(())
        }
        DeviceCommand::Restart { device, confirm } => {
            require_confirm(confirm, "restart a device")?;
            device_manager::restart_device(&ctx.pool, &device).await?;
            println!("restarted {device}");
            Ok(())
        }
        DeviceCommand::Time { device } => {
            let time = device_manager::get_device_time(&ctx.pool, &device).await?;
            println!("{time}");
            Ok(())
        }
        DeviceCommand::SyncTime { device } => {
            let time = device_manager::sync_device_time(&ctx.pool, &device).await?;
            println!("synced {device} to {time}");
            Ok(())
        }
    }
}

fn parse_date(s: &str, end_of_day: bool) -> Option<chrono::DateTime<chrono::Utc>> {
    let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let naive = if end_of_day {
        date.and_hms_opt(23, 59, 59)?
    } else {
        date.and_hms_opt(0, 0, 0)?
    };
    Some(chrono::TimeZone::from_utc_datetime(&chrono::Utc, &naive))
}

async fn attendance_command(cmd: AttendanceCommand, ctx: &CliContext) -> Result<()> {
    match cmd {
        AttendanceCommand::List { device, from, to } => {
            let date_from = from.as_deref().and_then(|s| parse_date(s, false));
            let date_to = to.as_deref().and_then(|s| parse_date(s, true));
            let records = attendance::get_attendance(
                &ctx.pool, &ctx.cache, &device, date_from, date_to, true,
            )
            .await?;
            for r in records {
                println!("{}\t{}\t{}\t{}", r.user_id, r.timestamp, r.status, r.punch);
            }
            Ok(())
        }
        AttendanceCommand::Count { device } => {
            let count = attendance::count_attendance(&ctx.pool, &ctx.cache, &device).await?;
            println!("{count}");
            Ok(())
        }
        AttendanceCommand::Clear { device, confirm } => {
            require_confirm(confirm, "clear attendance")?;
            attendance::clear_attendance(&ctx.pool, &device).await?;
            println!("cleared attendance on {device}");
            Ok(())
        }
    }
}

async fn user_command(cmd: UserCommand, ctx: &CliContext) -> Result<()> {
    match cmd {
        UserCommand::List { device } => {
            for u in user_sync::get_users(&ctx.pool, &device).await? {
                println!("{}\t{}\t{}", u.uid, u.user_id, u.name);
            }
            Ok(())
        }
        UserCommand::Add(args) => {
            let user = crate::protocol::User {
                uid: args.uid,
                user_id: args.user_id,
                name: args.name,
                privilege: 0,
                password: String::new(),
                group_id: "0".to_string(),
                card: 0,
            };
            user_sync::add_user(&ctx.pool, &args.device, user).await?;
            println!("added user on {}", args.device);
            Ok(())
        }
        UserCommand::Delete { device, uid, confirm } => {
            require_confirm(confirm, "delete a user")?;
            user_sync::delete_user(&ctx.pool, &device, uid).await?;
            println!("deleted uid={uid} on {device}");
            Ok(())
        }
        UserCommand::Sync { device, dry_run } => {
            let Some(hris) = &ctx.hris else {
                return Err(crate::error::FingerprintError::InvalidConfig(
                    "HRIS integration is not configured".to_string(),
                ));
            };
            let employees = hris.fetch_employees().await?;
            let outcome = user_sync::sync_from_hris(&ctx.pool, &device, &employees, dry_run).await?;
            println!(
                "added={} updated={} unchanged={} dry_run={}",
                outcome.added, outcome.updated, outcome.unchanged, outcome.dry_run
            );
            for line in outcome.details_add.iter().chain(outcome.details_update.iter()) {
                println!("  {line}");
            }
            Ok(())
        }
    }
}

async fn finger_command(cmd: FingerCommand, ctx: &CliContext) -> Result<()> {
    match cmd {
        FingerCommand::List { device, user_id } => {
            let templates =
                fingerprint::get_fingerprints(&ctx.pool, &device, user_id.as_deref()).await?;
            for fp in templates {
                println!("{}\t{}\tfinger={}", fp.uid, fp.user_id, fp.finger_index);
            }
            Ok(())
        }
        FingerCommand::Count { device } => {
            let count = fingerprint::count_fingerprints(&ctx.pool, &device).await?;
            println!("{count}");
            Ok(())
        }
    }
}

async fn backup_command(cmd: BackupCommand, ctx: &CliContext) -> Result<()> {
    let Some(s3) = &ctx.s3 else {
        return Err(crate::error::FingerprintError::InvalidConfig(
            "object storage is not configured".to_string(),
        ));
    };
    match cmd {
        BackupCommand::Run { device } => {
            let record = backup::run_backup(&ctx.pool, &ctx.cache, s3, &device, true).await?;
            println!(
                "backed up {}: {} users, {} fingerprints, {} attendance records",
                record.device_name, record.user_count, record.fingerprint_count, record.attendance_count
            );
            Ok(())
        }
        BackupCommand::List { device } => {
            for listing in backup::list_backups(s3, device.as_deref()).await? {
                println!(
                    "{}\t{}",
                    listing.key,
                    listing
                        .last_modified
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default()
                );
            }
            Ok(())
        }
        BackupCommand::Restore {
            s3_key,
            target_device,
            dry_run,
            confirm,
        } => {
            if !dry_run {
                require_confirm(confirm, "restore a backup")?;
            }
            let outcome = backup::restore_backup(
                &ctx.pool,
                s3,
                &s3_key,
                target_device.as_deref(),
                dry_run,
            )
            .await?;
            println!(
                "dry_run={} users_restored={} fingerprints_restored={} failures={}",
                outcome.dry_run,
                outcome.users_restored,
                outcome.fingerprints_restored,
                outcome.fingerprint_failures.len()
            );
            Ok(())
        }
    }
}

fn print_status(ctx: &CliContext) {
    let mut table = Table::new();
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["Environment", ctx.settings.environment.as_str()]);
    table.add_row(vec!["API host", ctx.settings.api_host.as_str()]);
    table.add_row(vec!["API port", &ctx.settings.api_port.to_string()]);
    table.add_row(vec!["Devices configured", &ctx.pool.device_keys().len().to_string()]);
    table.add_row(vec!["Object storage", &ctx.s3.is_some().to_string()]);
    table.add_row(vec!["HRIS integration", &ctx.hris.is_some().to_string()]);
    table.add_row(vec!["Scheduler enabled", &ctx.settings.scheduler_enabled.to_string()]);
    println!("{table}");
}

async fn test_connection(ctx: &CliContext) -> Result<()> {
    let mut ok = true;
    for key in ctx.pool.device_keys() {
        let reachable = device_manager::ping_device(&ctx.pool, &key).await.unwrap_or(false);
        println!("device {key}: {}", if reachable { "OK" } else { "FAILED" });
        ok &= reachable;
    }
    if let Some(s3) = &ctx.s3 {
        let reachable = s3.test_connection().await;
        println!("object storage: {}", if reachable { "OK" } else { "FAILED" });
        ok &= reachable;
    }
    if let Some(hris) = &ctx.hris {
        let reachable = hris.fetch_employees().await.is_ok();
        println!("HRIS: {}", if reachable { "OK" } else { "FAILED" });
        ok &= reachable;
    }
    if !ok {
        return Err(crate::error::FingerprintError::PeripheralFailure(
            "test-connection".to_string(),
            "one or more checks failed".to_string(),
        ));
    }
    Ok(())
}

async fn init_check(ctx: &CliContext, attempts: u32, delay_seconds: u64) -> Result<()> {
    for attempt in 1..=attempts {
        if test_connection(ctx).await.is_ok() {
            return Ok(());
        }
        log::warn!("init-check attempt {attempt}/{attempts} failed, retrying");
        tokio::time::sleep(std::time::Duration::from_secs(delay_seconds)).await;
    }
    Err(crate::error::FingerprintError::PeripheralFailure(
        "init-check".to_string(),
        format!("did not succeed after {attempts} attempts"),
    ))
}

fn print_command_list() {
    let mut table = Table::new();
    table.set_header(vec!["Command", "Description"]);
    for (cmd, desc) in [
        ("serve", "Start the HTTP API server"),
        ("status", "Print the loaded configuration"),
        ("test-connection", "Verify connectivity to devices and peripherals"),
        ("init-check", "Retry test-connection until it succeeds"),
        ("list", "List every available command"),
        ("device list|status|restart|time|sync-time", "Device operations"),
        ("attendance list|count|clear", "Attendance operations"),
        ("user list|add|delete|sync", "User operations"),
        ("finger list|count", "Fingerprint operations"),
        ("backup run|list|restore", "Backup operations"),
    ] {
        table.add_row(vec![cmd, desc]);
    }
    println!("{table}");
}
