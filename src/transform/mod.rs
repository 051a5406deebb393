//! Record transformers.
//!
//! Every source type maps to exactly one transformer. Claims and tags carry
//! business rules and enrichment joins; the remaining sources only rename and
//! coerce their fields. All transformers are pure functions of the input
//! table and the reference snapshot.

pub mod claim;
pub mod fields;
pub mod tag;

use log::info;

use crate::enrich::ReferenceData;
use crate::error::TransformError;
use crate::registry::{SourceType, SourceTypeDescriptor};
use crate::table::Table;

#[derive(Debug, Clone, Copy)]
pub struct Transformer<'a> {
    descriptor: &'a SourceTypeDescriptor,
}

impl<'a> Transformer<'a> {
    pub fn for_source(descriptor: &'a SourceTypeDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &'a SourceTypeDescriptor {
        self.descriptor
    }

    /// Shapes `table` into the destination schema.
    ///
    /// Fails only when the column that anchors the destination rows (the date
    /// column, or the employee column for undated sources) is absent.
    pub fn transform(&self, table: Table, refs: &ReferenceData) -> Result<Table, TransformError> {
        let descriptor = self.descriptor;
        info!(
            "Transforming {} ({} row(s) x {} column(s))",
            descriptor.id(),
            table.height(),
            table.width()
        );
        let mut probe = Table::from_rows(
            &table
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>(),
            Vec::new(),
        );
        fields::rename_columns(descriptor, &mut probe);
        if let Some(required) = required_column(descriptor)
            && !probe.has_column(required)
        {
            return Err(TransformError::MissingColumn {
                source_type: descriptor.id(),
                column: required.to_string(),
            });
        }

        let transformed = match descriptor.source {
            SourceType::Claim => claim::transform(descriptor, table, refs),
            SourceType::Tag => tag::transform(descriptor, table, refs),
            SourceType::Organization
            | SourceType::Meal
            | SourceType::KnoxApproval
            | SourceType::KnoxMail
            | SourceType::KnoxPims
            | SourceType::Eam
            | SourceType::Equis
            | SourceType::Lams
            | SourceType::Mes
            | SourceType::Mdm => {
                let mut table = table;
                fields::apply(descriptor, &mut table);
                table
            }
        };
        info!(
            "{} transformation complete: {} row(s), columns [{}]",
            descriptor.id(),
            transformed.height(),
            transformed.column_names().join(", ")
        );
        Ok(transformed)
    }
}

fn required_column(descriptor: &SourceTypeDescriptor) -> Option<&'static str> {
    descriptor
        .date_column
        .map(|date| date.name)
        .or(descriptor.employee_column)
}
