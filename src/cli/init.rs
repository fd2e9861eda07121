use std::path::PathBuf;

use crate::error::Result;
use crate::ledger::Ledger;
use crate::settings::{load_settings, save_settings, shellexpand_path, Backend};
use crate::store::open_store;

pub fn run(data_dir: Option<String>, backend: Option<Backend>, name: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(backend) = backend {
        settings.backend = backend;
    }
    if let Some(name) = name {
        settings.user_name = name.trim().to_string();
    }
    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;

    // Write the document once so an empty install has the default categories on disk.
    let mut ledger = Ledger::open(open_store(&settings)?);
    ledger.commit(|_| Ok(()))?;

    println!("Initialized kakeibo at {}", resolved.display());
    println!("Storage:    {} ({})", ledger.location(), settings.backend);
    Ok(())
}
