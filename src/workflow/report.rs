//! Plain-text rendering of scan and registration results

use crate::models::{BatchResult, DiscoveredOnt, OutcomeStatus, RegistrationOutcome};
use crate::workflow::discovery::Discovery;
use crate::workflow::selection::SelectionSet;
use std::fmt;

/// Read-only view over a finished batch
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    result: &'a BatchResult,
    show_commands: bool,
}

pub fn present(result: &BatchResult) -> Report<'_> {
    Report {
        result,
        show_commands: false,
    }
}

impl<'a> Report<'a> {
    /// Print each row's raw command trace under it
    pub fn with_commands(mut self, show: bool) -> Self {
        self.show_commands = show;
        self
    }

    pub fn summary(&self) -> String {
        format!(
            "Registered {} of {} ONT(s), {} failed",
            self.result.success_count, self.result.total, self.result.fail_count
        )
    }

    /// Command trace of row `index`, exactly as issued
    pub fn commands(&self, index: usize) -> Option<&'a [String]> {
        self.result.results.get(index).map(|o| o.commands.as_slice())
    }

    fn write_row(f: &mut fmt::Formatter<'_>, index: usize, outcome: &RegistrationOutcome) -> fmt::Result {
        let (tag, detail) = match &outcome.status {
            OutcomeStatus::Registered { ont_id, service_port_id } => {
                ("OK", format!("ont-id={} service-port={}", ont_id, service_port_id))
            }
            OutcomeStatus::Failed { error } => ("ERR", error.clone()),
        };
        writeln!(
            f,
            "{:>3}  {:<4} {:<18} {:<8} {}",
            index + 1,
            tag,
            outcome.sn,
            outcome.fsp,
            detail
        )
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        writeln!(f, "{:>3}  {:<4} {:<18} {:<8} {}", "#", "", "SN", "F/S/P", "DETAIL")?;

        for (i, outcome) in self.result.results.iter().enumerate() {
            Self::write_row(f, i, outcome)?;
            if self.show_commands {
                for cmd in self.commands(i).unwrap_or_default() {
                    writeln!(f, "       | {}", cmd)?;
                }
            }
        }
        Ok(())
    }
}

/// Discovered sequence as a table, marking selected rows with `*`
pub struct DiscoveryTable<'a> {
    discovery: &'a Discovery,
    selection: Option<&'a SelectionSet>,
}

pub fn discovery_table<'a>(discovery: &'a Discovery, selection: Option<&'a SelectionSet>) -> DiscoveryTable<'a> {
    DiscoveryTable { discovery, selection }
}

fn or_dash(v: &Option<String>) -> &str {
    v.as_deref().filter(|s| !s.is_empty()).unwrap_or("-")
}

impl DiscoveryTable<'_> {
    fn write_row(&self, f: &mut fmt::Formatter<'_>, position: usize, ont: &DiscoveredOnt) -> fmt::Result {
        let mark = match self.selection {
            Some(sel) if sel.contains(position) => "*",
            _ => " ",
        };
        writeln!(
            f,
            "{}{:>3}  {:<8} {:<18} {:<15} {:<6} {:<12} {:<16} {}",
            mark,
            position,
            ont.fsp,
            ont.sn,
            or_dash(&ont.sn_friendly),
            or_dash(&ont.vendor_id),
            or_dash(&ont.equipment_id),
            or_dash(&ont.software_version),
            or_dash(&ont.autofind_time)
        )
    }
}

impl fmt::Display for DiscoveryTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.discovery.source.is_simulated() {
            writeln!(f, "NOTE: {}", self.discovery.source)?;
        }
        if self.discovery.devices.is_empty() {
            return writeln!(f, "No new ONTs found on OLT {}", self.discovery.olt);
        }

        writeln!(
            f,
            "{} ONT(s) found on OLT {}",
            self.discovery.devices.len(),
            self.discovery.olt
        )?;
        writeln!(
            f,
            " {:>3}  {:<8} {:<18} {:<15} {:<6} {:<12} {:<16} {}",
            "POS", "F/S/P", "SN", "FRIENDLY SN", "VENDOR", "MODEL", "SOFTWARE", "FOUND"
        )?;
        for (position, ont) in self.discovery.devices.iter().enumerate() {
            self.write_row(f, position, ont)?;
        }
        Ok(())
    }
}
