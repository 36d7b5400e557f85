use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;
use tracing::warn;

use crate::constants::DEFAULT_TEAM;
use crate::RosterError;
use crate::RosterFormat;
use crate::Result;

/// All known monitors grouped by team, plus the merged name -> ip view.
///
/// Teams are merged in key order; a monitor listed by several teams keeps
/// the address from the last one.
#[derive(Debug, Clone, Default)]
pub struct MonitorRoster {
    teams: BTreeMap<String, BTreeMap<String, String>>,
    monitors: BTreeMap<String, String>,
}

impl MonitorRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(
        path: &Path,
        format: RosterFormat,
    ) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| RosterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let roster = match format {
            RosterFormat::Yaml => Self::from_records(&content),
            RosterFormat::Text => Self::from_text(&content),
        };
        debug!(
            "[MonitorRoster] loaded {} monitors in {} teams from {}",
            roster.len(),
            roster.teams.len(),
            path.display()
        );
        Ok(roster)
    }

    /// Parses `name:ip` lines into the default team.
    ///
    /// Only the first `:` separates name from address, so IPv6 addresses
    /// survive. Blank lines and `#` comments are ignored; malformed lines are
    /// skipped.
    pub fn from_text(content: &str) -> Self {
        let mut roster = Self::new();
        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once(':') {
                Some((name, ip)) if !name.trim().is_empty() && !ip.trim().is_empty() => {
                    roster.insert(DEFAULT_TEAM, name.trim(), ip.trim());
                }
                _ => warn!("[MonitorRoster] skipping malformed line {}: {:?}", lineno + 1, raw),
            }
        }
        roster
    }

    /// Parses the record format:
    ///
    /// ```text
    /// - .monitor: san-us
    ///   ip_address: 192.0.2.10
    ///   team: 1
    /// ```
    ///
    /// A record starts at each `.monitor:` key. Records without an address
    /// are skipped; records without a team land in the default team.
    pub fn from_records(content: &str) -> Self {
        let mut roster = Self::new();
        let mut current = PartialRecord::default();

        for line in content.lines() {
            let fields: Vec<&str> = line.split_whitespace().filter(|f| *f != "-").collect();
            if fields.len() != 2 {
                continue;
            }
            match fields[0] {
                ".monitor:" => {
                    current.flush_into(&mut roster);
                    current.name = Some(fields[1].to_string());
                }
                "ip_address:" => current.ip = Some(fields[1].to_string()),
                "team:" => current.team = Some(fields[1].to_string()),
                _ => {}
            }
        }
        current.flush_into(&mut roster);
        roster
    }

    pub fn insert(
        &mut self,
        team: &str,
        name: &str,
        ip: &str,
    ) {
        self.teams
            .entry(team.to_string())
            .or_default()
            .insert(name.to_string(), ip.to_string());
        self.merge();
    }

    fn merge(&mut self) {
        self.monitors.clear();
        for members in self.teams.values() {
            for (name, ip) in members {
                self.monitors.insert(name.clone(), ip.clone());
            }
        }
    }

    /// Merged name -> ip mapping
    pub fn monitors(&self) -> &BTreeMap<String, String> {
        &self.monitors
    }

    pub fn teams(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.teams
    }

    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.monitors.contains_key(name)
    }

    pub fn ip_of(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.monitors.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

#[derive(Default)]
struct PartialRecord {
    name: Option<String>,
    ip: Option<String>,
    team: Option<String>,
}

impl PartialRecord {
    fn flush_into(
        &mut self,
        roster: &mut MonitorRoster,
    ) {
        let record = std::mem::take(self);
        match (record.name, record.ip) {
            (Some(name), Some(ip)) => {
                let team = record.team.as_deref().unwrap_or(DEFAULT_TEAM);
                debug!("[MonitorRoster] monitor: {}, ip: {}, team: {}", name, ip, team);
                roster.insert(team, &name, &ip);
            }
            (Some(name), None) => warn!("[MonitorRoster] skipping monitor {} without ip_address", name),
            _ => {}
        }
    }
}
