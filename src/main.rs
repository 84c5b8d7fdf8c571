// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! excalidraw-tabs CLI entrypoint.
//!
//! Manages the documents of a store folder from the command line. `mirror <dir>` turns on the
//! plain-file copy of every document; later commands keep it up to date.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use excalidraw_tabs::model::{DiagramId, VersionId};
use excalidraw_tabs::store::{
    DiagramStore, FixedFolder, FolderPicker, StoreConfig, SvgThumbnailer, WriteDurability,
};

const DEFAULT_STORE_DIR: &str = ".excalidraw-tabs";

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--store <dir>] [--durable-writes] <command> [args...]\n\nCommands:\n  list\n  create [name]\n  rename <id> <name>\n  duplicate <id>\n  delete <id>\n  import <file>\n  export <id> [dir]\n  versions <id>\n  save-version <id> <label>\n  restore-version <id> <version-id>\n  mirror <dir>\n  mirror-off\n  restore-from-mirror\n  migrate\n\nIf --store is omitted, `{DEFAULT_STORE_DIR}` in the current directory is used.\n--durable-writes opts into slower, best-effort durable persistence (fsync/sync where supported)."
    );
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List,
    Create { name: Option<String> },
    Rename { id: String, name: String },
    Duplicate { id: String },
    Delete { id: String },
    Import { file: PathBuf },
    Export { id: String, dir: Option<PathBuf> },
    Versions { id: String },
    SaveVersion { id: String, label: String },
    RestoreVersion { id: String, version_id: String },
    Mirror { dir: PathBuf },
    MirrorOff,
    RestoreFromMirror,
    Migrate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    store_dir: Option<String>,
    durable_writes: bool,
    command: Command,
}

fn parse_command(name: &str, args: Vec<String>) -> Result<Command, ()> {
    let mut args = args.into_iter();
    let mut next = || args.next().ok_or(());

    let command = match name {
        "list" => Command::List,
        "create" => Command::Create { name: next().ok() },
        "rename" => Command::Rename {
            id: next()?,
            name: next()?,
        },
        "duplicate" => Command::Duplicate { id: next()? },
        "delete" => Command::Delete { id: next()? },
        "import" => Command::Import {
            file: PathBuf::from(next()?),
        },
        "export" => Command::Export {
            id: next()?,
            dir: next().ok().map(PathBuf::from),
        },
        "versions" => Command::Versions { id: next()? },
        "save-version" => Command::SaveVersion {
            id: next()?,
            label: next()?,
        },
        "restore-version" => Command::RestoreVersion {
            id: next()?,
            version_id: next()?,
        },
        "mirror" => Command::Mirror {
            dir: PathBuf::from(next()?),
        },
        "mirror-off" => Command::MirrorOff,
        "restore-from-mirror" => Command::RestoreFromMirror,
        "migrate" => Command::Migrate,
        _ => return Err(()),
    };

    if next().is_ok() {
        return Err(());
    }
    Ok(command)
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<CliOptions, ()> {
    let mut store_dir = None;
    let mut durable_writes = false;

    let command_name = loop {
        let arg = args.next().ok_or(())?;
        match arg.as_str() {
            "--store" => {
                if store_dir.is_some() {
                    return Err(());
                }
                store_dir = Some(args.next().ok_or(())?);
            }
            "--durable-writes" => {
                if durable_writes {
                    return Err(());
                }
                durable_writes = true;
            }
            _ if arg.starts_with('-') => return Err(()),
            _ => break arg,
        }
    };

    let rest = args.collect::<Vec<_>>();
    if rest.iter().any(|arg| arg == "--store" || arg == "--durable-writes") {
        return Err(());
    }

    Ok(CliOptions {
        store_dir,
        durable_writes,
        command: parse_command(&command_name, rest)?,
    })
}

fn diagram_id(raw: &str) -> Result<DiagramId, Box<dyn Error>> {
    Ok(DiagramId::new(raw)?)
}

fn open_store(options: &CliOptions) -> DiagramStore {
    let mut config = StoreConfig::default();
    if options.durable_writes {
        config = config.with_durability(WriteDurability::Durable);
    }

    let picker: Arc<dyn FolderPicker> = match &options.command {
        Command::Mirror { dir } => Arc::new(FixedFolder::new(dir)),
        _ => Arc::new(FixedFolder::unsupported()),
    };
    let root = options
        .store_dir
        .clone()
        .unwrap_or_else(|| DEFAULT_STORE_DIR.to_owned());
    DiagramStore::open_with(root, config, picker, Arc::new(SvgThumbnailer))
}

async fn run(store: DiagramStore, command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::List => {
            for entry in store.index().await? {
                println!(
                    "{}\t{}\t{} elements\tupdated {}",
                    entry.id, entry.name, entry.element_count, entry.updated_at
                );
            }
        }
        Command::Create { name } => {
            let diagram = store.create(name.as_deref()).await?;
            println!("{}", diagram.id);
        }
        Command::Rename { id, name } => {
            store.rename(&diagram_id(&id)?, &name).await?;
        }
        Command::Duplicate { id } => {
            let copy = store.duplicate(&diagram_id(&id)?).await?;
            store.mirror().save(&copy.id, &copy.name, &copy.data);
            store.mirror().flush(&copy.id).await;
            println!("{}", copy.id);
        }
        Command::Delete { id } => {
            store.delete(&diagram_id(&id)?).await?;
        }
        Command::Import { file } => {
            let diagram = store.import_from_file(&file).await?;
            store.regenerate_thumbnail(&diagram.id, &diagram.data).await?;
            store.mirror().save(&diagram.id, &diagram.name, &diagram.data);
            store.mirror().flush(&diagram.id).await;
            println!("{}", diagram.id);
        }
        Command::Export { id, dir } => {
            let dir = dir.unwrap_or_else(|| PathBuf::from("."));
            let path = store.export_to_file(&diagram_id(&id)?, &dir).await?;
            println!("{}", path.display());
        }
        Command::Versions { id } => {
            for version in store.versions(&diagram_id(&id)?).await? {
                println!(
                    "{}\t{}\t{} elements\t{}",
                    version.id,
                    version.label,
                    version.data.element_count(),
                    version.timestamp
                );
            }
        }
        Command::SaveVersion { id, label } => {
            let id = diagram_id(&id)?;
            let diagram = store
                .get(&id)
                .await?
                .ok_or_else(|| format!("diagram not found: {id}"))?;
            let version = store.save_version(&id, &label, &diagram.data).await?;
            println!("{}", version.id);
        }
        Command::RestoreVersion { id, version_id } => {
            let id = diagram_id(&id)?;
            let version_id = VersionId::new(version_id)?;
            let data = store
                .restore_version(&id, &version_id)
                .await?
                .ok_or_else(|| format!("version not found: {version_id}"))?;
            store.regenerate_thumbnail(&id, &data).await?;
            store.mirror().flush(&id).await;
        }
        Command::Mirror { dir } => {
            let Some(dir) = store.mirror().pick_directory().await else {
                return Err(format!("cannot mirror into {}", dir.display()).into());
            };
            mirror_all(&store).await?;
            println!("{}", dir.display());
        }
        Command::MirrorOff => store.mirror().disable(),
        Command::RestoreFromMirror => {
            if !store.mirror().verify_permission().await {
                return Err("no mirror folder configured".into());
            }
            let report = store.restore_from_mirror().await?;
            println!(
                "found {}, imported {}, skipped {}, failed {}",
                report.found, report.imported, report.skipped, report.failed
            );
        }
        Command::Migrate => match store.migrate_legacy_scene().await? {
            Some(id) => println!("{id}"),
            None => println!("nothing to migrate"),
        },
    }
    Ok(())
}

/// Writes every document into a freshly chosen mirror folder.
async fn mirror_all(store: &DiagramStore) -> Result<(), Box<dyn Error>> {
    for entry in store.index().await? {
        let Some(diagram) = store.get(&entry.id).await? else {
            continue;
        };
        store.mirror().save(&diagram.id, &diagram.name, &diagram.data);
        store.mirror().flush(&diagram.id).await;
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let result = (|| -> Result<(), Box<dyn Error>> {
        let mut args = std::env::args();
        let program = args.next().unwrap_or_else(|| "excalidraw-tabs".to_owned());

        let options = match parse_options(args) {
            Ok(options) => options,
            Err(()) => {
                print_usage(&program);
                std::process::exit(2);
            }
        };

        let store = open_store(&options);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(run(store, options.command))
    })();

    if let Err(err) = result {
        eprintln!("excalidraw-tabs: {err}");
        std::process::exit(1);
    }
}
