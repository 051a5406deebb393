//! Read-only enrichment joins against the organization master and the
//! grade → level mapping.
//!
//! Reference data is loaded once per upload into a [`ReferenceData`]
//! snapshot. A reference table that cannot be read degrades to `None` with a
//! warning; the joins then leave their target fields untouched.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info, warn};

use crate::config::ReferenceSettings;
use crate::data::{Value, normalize_key};
use crate::error::TransformError;
use crate::store::Gateway;
use crate::table::Table;

const MAX_UNMATCHED_LOGGED: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgRecord {
    pub name: Option<String>,
    pub position: Option<String>,
    pub center: Option<String>,
    pub team: Option<String>,
    pub group: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgField {
    Name,
    Position,
    Center,
    Team,
    Group,
}

impl OrgRecord {
    pub fn get(&self, field: OrgField) -> Option<&str> {
        match field {
            OrgField::Name => self.name.as_deref(),
            OrgField::Position => self.position.as_deref(),
            OrgField::Center => self.center.as_deref(),
            OrgField::Team => self.team.as_deref(),
            OrgField::Group => self.group.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    /// Keyed by employee id rendered as text.
    pub organization: Option<HashMap<String, OrgRecord>>,
    /// Keyed by normalized grade name.
    pub grade_levels: Option<HashMap<String, String>>,
}

impl ReferenceData {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_organization(mut self, records: impl IntoIterator<Item = (String, OrgRecord)>) -> Self {
        self.organization = Some(
            records
                .into_iter()
                .map(|(id, record)| (normalize_key(&id), record))
                .collect(),
        );
        self
    }

    pub fn with_grade_levels<'a>(mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.grade_levels = Some(
            pairs
                .into_iter()
                .map(|(grade, level)| (normalize_key(grade), level.to_string()))
                .collect(),
        );
        self
    }

    /// Snapshots both reference tables. Never fails.
    pub fn load(gateway: &mut Gateway, settings: &ReferenceSettings) -> Self {
        let organization = match load_organization(gateway, settings) {
            Ok(map) => {
                info!("Loaded {} organization record(s) for backfill", map.len());
                Some(map)
            }
            Err(err) => {
                warn!("Organization backfill disabled: {err}");
                None
            }
        };
        let grade_levels = match load_grade_levels(gateway, settings) {
            Ok(map) => {
                info!("Loaded {} grade → level mapping(s)", map.len());
                Some(map)
            }
            Err(err) => {
                warn!("Employee level enrichment disabled: {err}");
                None
            }
        };
        Self {
            organization,
            grade_levels,
        }
    }
}

fn load_organization(
    gateway: &mut Gateway,
    settings: &ReferenceSettings,
) -> Result<HashMap<String, OrgRecord>, TransformError> {
    let columns = [
        settings.organization_id_column.as_str(),
        settings.organization_name_column.as_str(),
        settings.organization_position_column.as_str(),
        settings.organization_center_column.as_str(),
        settings.organization_team_column.as_str(),
        settings.organization_group_column.as_str(),
    ];
    let rows = gateway
        .read_columns(&settings.organization_table, &columns)
        .map_err(|err| TransformError::Reference {
            table: settings.organization_table.clone(),
            message: err.to_string(),
        })?;
    let text = |cell: &Option<Value>| {
        cell.as_ref()
            .map(|v| v.as_display().trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let mut map = HashMap::with_capacity(rows.len());
    for row in rows {
        let Some(id) = row[0].as_ref().map(Value::as_key) else {
            continue;
        };
        map.insert(
            id,
            OrgRecord {
                name: text(&row[1]),
                position: text(&row[2]),
                center: text(&row[3]),
                team: text(&row[4]),
                group: text(&row[5]),
            },
        );
    }
    Ok(map)
}

fn load_grade_levels(
    gateway: &mut Gateway,
    settings: &ReferenceSettings,
) -> Result<HashMap<String, String>, TransformError> {
    let rows = gateway
        .read_columns(
            &settings.grade_table,
            &[
                settings.grade_name_column.as_str(),
                settings.grade_level_column.as_str(),
            ],
        )
        .map_err(|err| TransformError::Reference {
            table: settings.grade_table.clone(),
            message: err.to_string(),
        })?;
    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let grade = row[0].as_ref()?.as_key();
            let level = row[1].as_ref()?.as_display();
            Some((grade, level))
        })
        .collect())
}

/// Fills null target cells from the organization record of the row's
/// employee. Populated cells are never overwritten. Returns the number of
/// cells filled.
pub fn backfill_organization(
    table: &mut Table,
    id_column: &str,
    pairs: &[(&str, OrgField)],
    refs: &ReferenceData,
) -> usize {
    let Some(organization) = refs.organization.as_ref() else {
        debug!("No organization snapshot; backfill skipped");
        return 0;
    };
    let Some(ids) = table.column(id_column) else {
        return 0;
    };
    let keys = ids
        .values
        .iter()
        .map(|cell| cell.as_ref().map(Value::as_key))
        .collect::<Vec<_>>();

    let height = table.height();
    let mut filled = 0;
    for (target, field) in pairs {
        if !table.has_column(target) {
            table.set_column(target, vec![None; height]);
        }
        let Some(column) = table.column_mut(target) else {
            continue;
        };
        for (cell, key) in column.values.iter_mut().zip(&keys) {
            if cell.is_some() {
                continue;
            }
            if let Some(key) = key
                && let Some(value) = organization.get(key).and_then(|r| r.get(*field))
            {
                *cell = Some(Value::Text(value.to_string()));
                filled += 1;
            }
        }
    }
    if filled > 0 {
        info!("Backfilled {filled} organization field(s) from the master table");
    }
    filled
}

/// Joins the normalized grade text to the grade → level mapping, filling
/// null cells of `level_column` (created when absent). Unmatched grades are
/// logged and left null.
/// Returns the number of rows carrying a level afterwards.
pub fn attach_employee_level(
    table: &mut Table,
    grade_column: &str,
    level_column: &str,
    refs: &ReferenceData,
) -> usize {
    let height = table.height();
    if !table.has_column(level_column) {
        table.set_column(level_column, vec![None; height]);
    }
    let Some(grades) = table.column(grade_column) else {
        warn!("No '{grade_column}' column; employee level not set");
        return 0;
    };
    let grade_keys = grades
        .values
        .iter()
        .map(|cell| cell.as_ref().map(Value::as_key))
        .collect::<Vec<_>>();
    let Some(mapping) = refs.grade_levels.as_ref() else {
        debug!("No grade mapping snapshot; employee level not set");
        return 0;
    };
    let Some(levels) = table.column_mut(level_column) else {
        return 0;
    };

    let mut unmatched = BTreeSet::new();
    for (cell, grade) in levels.values.iter_mut().zip(&grade_keys) {
        if cell.is_some() {
            continue;
        }
        let Some(grade) = grade else {
            continue;
        };
        match mapping.get(grade) {
            Some(level) => *cell = Some(Value::Text(level.clone())),
            None => {
                unmatched.insert(grade.clone());
            }
        }
    }
    let with_level = levels.values.iter().filter(|c| c.is_some()).count();
    info!(
        "Employee level set on {with_level}/{height} row(s) ({:.1}%)",
        if height == 0 {
            0.0
        } else {
            with_level as f64 * 100.0 / height as f64
        }
    );
    if !unmatched.is_empty() {
        let sample = unmatched
            .iter()
            .take(MAX_UNMATCHED_LOGGED)
            .cloned()
            .collect::<Vec<_>>();
        warn!(
            "{} grade(s) without a level mapping: {}",
            unmatched.len(),
            sample.join(", ")
        );
    }
    with_level
}
