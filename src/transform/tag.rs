use crate::enrich::{self, OrgField, ReferenceData};
use crate::registry::SourceTypeDescriptor;
use crate::table::Table;
use crate::transform::fields;

const ORG_BACKFILL: &[(&str, OrgField)] = &[
    ("NAME", OrgField::Name),
    ("CENTER", OrgField::Center),
    ("TEAM", OrgField::Team),
    ("GROUP_A", OrgField::Group),
];

/// Access-control tag events. `출입시각` stays an `HHMMSS` integer token.
pub fn transform(
    descriptor: &SourceTypeDescriptor,
    mut table: Table,
    refs: &ReferenceData,
) -> Table {
    fields::rename_columns(descriptor, &mut table);
    fields::coerce_columns(descriptor, &mut table);
    if let Some(id_column) = descriptor.employee_column {
        enrich::backfill_organization(&mut table, id_column, ORG_BACKFILL, refs);
    }
    fields::project(descriptor, &mut table);
    table
}
