//! Column projection.

use super::error::ExecutorError;
use crate::catalog::{Column, Schema};
use crate::tuple::Tuple;

/// Maps input tuples to a subset of their columns.
#[derive(Debug, Clone)]
pub(crate) struct Projection {
    offsets: Vec<usize>,
    schema: Schema,
}

impl Projection {
    /// Resolves `columns` against `input`. An empty list keeps every column.
    ///
    /// A column named twice is projected once.
    pub(crate) fn new(input: &Schema, columns: &[String]) -> Result<Self, ExecutorError> {
        if columns.is_empty() {
            return Ok(Self {
                offsets: (0..input.len()).collect(),
                schema: input.clone(),
            });
        }

        let mut offsets = Vec::with_capacity(columns.len());
        for name in columns {
            let offset = input.offset_of(name)?;
            if !offsets.contains(&offset) {
                offsets.push(offset);
            }
        }
        let schema = Schema::new(
            offsets
                .iter()
                .map(|&o| input.columns()[o].clone())
                .collect::<Vec<Column>>(),
        )?;
        Ok(Self { offsets, schema })
    }

    /// Returns the output schema.
    pub(crate) fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns true if the projection keeps every input column in order.
    pub(crate) fn is_identity(&self, input: &Schema) -> bool {
        self.offsets.len() == input.len() && self.offsets.iter().enumerate().all(|(i, &o)| i == o)
    }

    pub(crate) fn apply(&self, tuple: &Tuple) -> Tuple {
        Tuple::from_fields(
            self.offsets
                .iter()
                .map(|&o| tuple.fields()[o].clone())
                .collect(),
        )
    }
}
