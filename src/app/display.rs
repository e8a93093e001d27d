//! Table output for the binary

use crate::core::styles::StyleRole;
use crate::host::api::{LoadReport, ModuleStatus, ShutdownReport};
use crate::module::api::{ModuleInfo, ModuleState};
use prettytable::{format, Cell, Row, Table};

fn cell(text: &str, role: StyleRole, use_color: bool) -> Cell {
    let cell = Cell::new(text);
    match role.to_prettytable_spec().filter(|_| use_color) {
        Some(spec) => cell.style_spec(spec),
        None => cell,
    }
}

fn header(titles: &[&str], use_color: bool) -> Row {
    Row::new(
        titles
            .iter()
            .map(|title| cell(title, StyleRole::Header, use_color))
            .collect(),
    )
}

fn base_table() -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table
}

/// Table of builtin modules: name, version, API version, description
pub fn modules_table(modules: &[ModuleInfo], use_color: bool) -> Table {
    let mut table = base_table();
    table.set_titles(header(&["Module", "Version", "API", "Description"], use_color));
    for info in modules {
        table.add_row(Row::new(vec![
            cell(&info.name, StyleRole::Name, use_color),
            Cell::new(&info.version),
            cell(&info.api_version.to_string(), StyleRole::Dim, use_color),
            Cell::new(&info.description),
        ]));
    }
    table
}

fn state_role(state: ModuleState) -> StyleRole {
    match state {
        ModuleState::PostInitialized => StyleRole::Running,
        ModuleState::Faulted => StyleRole::Faulted,
        _ => StyleRole::Value,
    }
}

/// Table of registered modules with their state and capabilities
pub fn status_table(statuses: &[ModuleStatus], use_color: bool) -> Table {
    let mut table = base_table();
    table.set_titles(header(&["Module", "State", "Capabilities"], use_color));
    for status in statuses {
        let capabilities = if status.capabilities.is_empty() {
            "-".to_string()
        } else {
            status.capabilities.join(", ")
        };
        table.add_row(Row::new(vec![
            cell(&status.info.name, StyleRole::Name, use_color),
            cell(status.state.name(), state_role(status.state), use_color),
            Cell::new(&capabilities),
        ]));
    }
    table
}

pub fn print_load_report(report: &LoadReport, use_color: bool) {
    let summary = format!(
        "{} module(s) loaded, {} failed",
        report.loaded.len(),
        report.failures.len()
    );
    println!("{}", StyleRole::Header.paint(&summary, use_color));
    for failure in &report.failures {
        println!("  {}", StyleRole::Faulted.paint(&failure.to_string(), use_color));
    }
}

pub fn print_shutdown_report(report: &ShutdownReport, use_color: bool) {
    let role = if report.is_clean() {
        StyleRole::Running
    } else {
        StyleRole::Faulted
    };
    println!("{}", role.paint(&report.to_string(), use_color));
}
