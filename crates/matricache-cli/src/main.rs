//! matricache - command-line client for the school records cache.
//!
//! Inspects the persisted cache and drives data binders against the records
//! backend: one-shot fetches, live watching with polling, and optimistic
//! deletes/updates.

use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use matricache_core::{ApiClient, Config, DataBinder, Resource, Snapshot, SyncContext};

const USAGE: &str = "\
Usage: matricache <command> [args]

Commands:
  keys                          List cached keys with their age
  show <key>                    Print the cached value for a key
  clear [key]                   Remove one key, or the whole cache
  fetch <resource>              Fetch a resource once and cache it
  watch <resource> [secs]       Keep a resource fresh, printing every change
  remove <resource> <id>        Delete an item on the backend and in the cache
  update <resource> <id> <json> Patch an item on the backend and in the cache

Resources: alunos, cursos, salas, turmas, lista_espera, vagas, inscricoes";

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "matricache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load()?.apply_env();
    let _guard = init_tracing(config.log_dir.as_deref());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    let ctx = SyncContext::new(config.open_store()?);
    info!(command = %command, "matricache starting");

    match command.as_str() {
        "keys" => list_keys(&ctx, &config),
        "show" => show(&ctx, arg(rest, 0, "key")?),
        "clear" => {
            clear(&ctx, rest.first().map(String::as_str));
            Ok(())
        }
        "fetch" => fetch(&ctx, &config, parse_resource(arg(rest, 0, "resource")?)?).await,
        "watch" => {
            let resource = parse_resource(arg(rest, 0, "resource")?)?;
            let every = match rest.get(1) {
                Some(secs) => Duration::from_secs(secs.parse().context("Interval must be whole seconds")?),
                None => config.poll_interval(resource),
            };
            let every = every.max(Duration::from_secs(1));
            watch(&ctx, &config, resource, every).await
        }
        "remove" => {
            let resource = parse_resource(arg(rest, 0, "resource")?)?;
            remove(&ctx, &config, resource, arg(rest, 1, "id")?).await
        }
        "update" => {
            let resource = parse_resource(arg(rest, 0, "resource")?)?;
            let patch: Value = serde_json::from_str(arg(rest, 2, "json patch")?)
                .context("Patch must be a JSON object")?;
            update(&ctx, &config, resource, arg(rest, 1, "id")?, patch).await
        }
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
}

fn arg<'a>(rest: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    rest.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing argument: <{}>\n\n{}", name, USAGE))
}

fn parse_resource(raw: &str) -> Result<Resource> {
    Resource::from_key(raw).ok_or_else(|| anyhow!("Unknown resource: {}", raw))
}

/// Numeric ids stay numbers so they compare equal to the backend's ids.
fn parse_id(raw: &str) -> Value {
    raw.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn api_client(config: &Config) -> Result<ApiClient> {
    let api = ApiClient::new(&config.api_base_url)?;
    Ok(match config.api_token {
        Some(ref token) => api.with_token(token),
        None => api,
    })
}

fn bind(ctx: &SyncContext, api: &ApiClient, resource: Resource, auto_fetch: bool) -> DataBinder {
    ctx.bind(resource.key(), api.fetcher(resource.path()), auto_fetch)
}

fn describe(resource: Resource, snap: &Snapshot) -> String {
    let contents = match (snap.item_count(), &snap.data) {
        (Some(count), _) => format!("{} items", count),
        (None, Some(_)) => "1 value".to_string(),
        (None, None) => "no data".to_string(),
    };

    let status = if snap.loading {
        "loading".to_string()
    } else if let Some(ref error) = snap.error {
        format!("error: {}", error)
    } else if let Some(ref failure) = snap.last_failure {
        format!("stale, last refresh failed: {}", failure.error)
    } else {
        "ok".to_string()
    };

    format!("{:<13} {:<10} {}", resource.key(), contents, status)
}

// ============================================================================
// Commands
// ============================================================================

fn list_keys(ctx: &SyncContext, config: &Config) -> Result<()> {
    let store = ctx.store();
    if store.is_empty() {
        println!("Cache is empty");
        return Ok(());
    }

    for key in store.keys() {
        let age = store.age_display(&key).unwrap_or_else(|| "never".to_string());
        let freshness = if store.is_valid(&key, config.max_age()) { "fresh" } else { "stale" };
        println!("{:<13} {:<10} {}", key, age, freshness);
    }
    Ok(())
}

fn show(ctx: &SyncContext, key: &str) -> Result<()> {
    let data = ctx
        .store()
        .get(key)
        .ok_or_else(|| anyhow!("Nothing cached for {}", key))?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

fn clear(ctx: &SyncContext, key: Option<&str>) {
    match key {
        Some(key) => {
            ctx.store().clear(key);
            println!("Cleared {}", key);
        }
        None => {
            ctx.store().clear_all();
            println!("Cache cleared");
        }
    }
}

async fn fetch(ctx: &SyncContext, config: &Config, resource: Resource) -> Result<()> {
    let api = api_client(config)?;
    let binder = bind(ctx, &api, resource, false);
    binder.refresh(false).await;

    let snap = binder.snapshot();
    println!("{}", describe(resource, &snap));
    if let Some(error) = snap.error {
        bail!("Fetching {} failed: {}", resource, error);
    }
    Ok(())
}

async fn watch(ctx: &SyncContext, config: &Config, resource: Resource, every: Duration) -> Result<()> {
    let api = api_client(config)?;
    let binder = bind(ctx, &api, resource, true);
    let mut changes = binder.subscribe();

    println!("{}", describe(resource, &binder.snapshot()));
    let poller = binder.spawn_polling(every);
    info!(resource = %resource, every_secs = every.as_secs(), "Watching");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = changes.borrow_and_update().clone();
                println!("{}", describe(resource, &snap));
            }
        }
    }

    binder.teardown();
    poller.await.context("Polling task failed")?;
    Ok(())
}

async fn remove(ctx: &SyncContext, config: &Config, resource: Resource, id: &str) -> Result<()> {
    let api = api_client(config)?;
    api.delete(&resource.item_path(id))
        .await
        .with_context(|| format!("Failed to delete {} {}", resource, id))?;

    let binder = bind(ctx, &api, resource, false);
    if binder.remove(parse_id(id)) {
        println!("Removed {} from cached {}", id, resource);
    } else {
        println!("Deleted {} {} (not in cache)", resource, id);
    }
    Ok(())
}

async fn update(
    ctx: &SyncContext,
    config: &Config,
    resource: Resource,
    id: &str,
    patch: Value,
) -> Result<()> {
    if !patch.is_object() {
        bail!("Patch must be a JSON object");
    }

    let api = api_client(config)?;
    api.patch_json(&resource.item_path(id), &patch)
        .await
        .with_context(|| format!("Failed to update {} {}", resource, id))?;

    let binder = bind(ctx, &api, resource, false);
    if binder.update(parse_id(id), patch) {
        println!("Updated {} in cached {}", id, resource);
    } else {
        println!("Updated {} {} (not in cache)", resource, id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use matricache_core::FetchError;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42"), json!(42));
        assert_eq!(parse_id("abc-1"), json!("abc-1"));
    }

    #[test]
    fn test_parse_resource() {
        assert_eq!(parse_resource("lista-espera").unwrap(), Resource::ListaEspera);
        assert!(parse_resource("notas").is_err());
    }

    #[test]
    fn test_describe() {
        let snap = Snapshot::seeded(Some(json!([1, 2])), true);
        assert_eq!(describe(Resource::Vagas, &snap), "vagas         2 items    ok");

        let loading = Snapshot::seeded(None, true);
        assert!(describe(Resource::Vagas, &loading).ends_with("loading"));

        let degraded = Snapshot {
            last_failure: Some(matricache_core::binder::Failure {
                error: FetchError::Failed("timeout".into()),
                at: 0,
            }),
            data: Some(Arc::new(json!({"total": 1}))),
            ..Default::default()
        };
        assert!(describe(Resource::Cursos, &degraded).contains("1 value"));
        assert!(describe(Resource::Cursos, &degraded).contains("stale, last refresh failed"));
    }
}
