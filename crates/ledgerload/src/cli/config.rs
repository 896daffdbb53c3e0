//! `ledgerload config`: show resolved paths and connection settings.

use ledgerload::config;
use ledgerload_db::{parse_url, StoreTarget};

/// Arguments for the config command
#[derive(Debug)]
pub struct ConfigArgs<'a> {
    pub database_url: Option<&'a str>,
    pub json: bool,
}

fn describe_store(url: Option<&str>) -> (String, Option<String>) {
    match url {
        None => ("not set".to_string(), None),
        Some(url) => match parse_url(url) {
            Ok(StoreTarget::Memory) => (url.to_string(), Some("in-memory".to_string())),
            Ok(StoreTarget::File(path)) => {
                let state = if path.exists() { "exists" } else { "will be created" };
                (url.to_string(), Some(format!("{} ({})", path.display(), state)))
            }
            Err(err) => (url.to_string(), Some(format!("invalid: {}", err))),
        },
    }
}

pub fn run(args: ConfigArgs<'_>) -> anyhow::Result<()> {
    let url = config::resolve_database_url(args.database_url).ok();
    let data_dir = config::default_data_dir();
    let schema = config::default_schema_path();
    let home = config::ledgerload_home();
    let logs = config::logs_dir();

    if args.json {
        let output = serde_json::json!({
            "home": home.to_string_lossy(),
            "logs": {
                "path": logs.to_string_lossy(),
                "exists": logs.exists(),
            },
            "data_dir": {
                "path": data_dir.to_string_lossy(),
                "exists": data_dir.exists(),
            },
            "schema": {
                "path": schema.to_string_lossy(),
                "exists": schema.exists(),
            },
            "database_url": {
                "configured": url.is_some(),
                "value": url,
            },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let (url_text, target) = describe_store(url.as_deref());
        println!("LEDGERLOAD CONFIGURATION");
        println!("========================");
        println!();
        println!("Home:         {}", home.display());
        println!("Logs:         {}", logs.display());
        println!("Data dir:     {}", data_dir.display());
        println!("Schema:       {}", schema.display());
        println!("DATABASE_URL: {}", url_text);
        if let Some(target) = target {
            println!("Store:        {}", target);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_description() {
        assert_eq!(describe_store(None).0, "not set");
        assert_eq!(
            describe_store(Some("duckdb::memory:")).1.as_deref(),
            Some("in-memory")
        );
        assert!(describe_store(Some("mysql://x"))
            .1
            .unwrap()
            .starts_with("invalid"));
    }
}
