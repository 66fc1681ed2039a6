//! Buffered row insertion for one destination table.

use std::sync::Arc;

use tracing::debug;

use crate::core::{DestinationDatabase, Row};
use crate::error::Result;

/// Buffers rows for one table and inserts them in batches.
///
/// [`TableWriter::post_write`] must be called once after the last row, even
/// when no rows were written, so the destination can run its end-of-table
/// fix-ups.
pub struct TableWriter {
    destination: Arc<dyn DestinationDatabase>,
    table: String,
    batch_size: usize,
    buffer: Vec<Row>,
    written: u64,
}

impl TableWriter {
    pub fn new(
        destination: Arc<dyn DestinationDatabase>,
        table: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            destination,
            table: table.into(),
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            written: 0,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Rows inserted so far (excluding rows still buffered).
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Buffer a row, inserting the batch once it is full.
    pub async fn write(&mut self, row: Row) -> Result<()> {
        self.buffer.push(row);
        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.buffer);
        let inserted = self.destination.insert_rows(&self.table, &batch).await?;
        debug!("{}: inserted batch of {} rows", self.table, inserted);
        self.written += inserted;
        Ok(())
    }

    /// Insert the remaining rows and finalize the table.
    ///
    /// Returns the total number of rows written.
    pub async fn post_write(mut self) -> Result<u64> {
        self.flush().await?;
        self.destination.finalize_table(&self.table).await?;
        Ok(self.written)
    }
}
