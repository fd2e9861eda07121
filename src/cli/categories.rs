use crate::cli::{confirm, open_ledger};
use crate::error::Result;

pub fn add(name: &str) -> Result<()> {
    let mut ledger = open_ledger()?;
    if ledger.commit(|s| Ok(s.add_merchant_type(name)))? {
        println!("Added category: {}", name.trim());
    } else {
        println!("Category '{}' is blank or already exists.", name.trim());
    }
    Ok(())
}

pub fn remove(name: &str, yes: bool) -> Result<()> {
    let mut ledger = open_ledger()?;
    if !ledger.state.merchant_types.iter().any(|m| m == name) {
        println!("No category named '{name}'.");
        return Ok(());
    }
    if !confirm(&format!("Remove {name}?"), yes) {
        println!("Cancelled.");
        return Ok(());
    }
    ledger.commit(|s| Ok(s.remove_merchant_type(name)))?;
    println!("Removed category: {name}");
    Ok(())
}

pub fn list() -> Result<()> {
    let ledger = open_ledger()?;
    for name in &ledger.state.merchant_types {
        println!("{name}");
    }
    Ok(())
}
