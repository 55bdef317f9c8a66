//! Medicine line item database operations.

use rusqlite::params;

use super::{Database, DbError, DbResult};
use crate::collaborators::{CollaboratorResult, MedicineSource};
use crate::models::MedicineLineItem;

impl Database {
    /// Attach medicines to a prescription, preserving their order.
    pub fn attach_medicines(&self, prescription_id: &str, medicines: &[MedicineLineItem]) -> DbResult<()> {
        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO prescription_medicines (prescription_id, position, product_id, name, quantity)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )?;

        for (position, item) in medicines.iter().enumerate() {
            if item.quantity == 0 {
                return Err(DbError::Constraint(format!(
                    "Quantity must be positive for {}",
                    item.product_id
                )));
            }
            stmt.execute(params![
                prescription_id,
                position as i64,
                item.product_id,
                item.name,
                item.quantity,
            ])?;
        }
        Ok(())
    }

    /// Get the medicines attached to a prescription.
    pub fn get_medicines(&self, prescription_id: &str) -> DbResult<Vec<MedicineLineItem>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT product_id, name, quantity
            FROM prescription_medicines
            WHERE prescription_id = ?
            ORDER BY position
            "#,
        )?;

        let rows = stmt.query_map([prescription_id], |row| {
            Ok(MedicineLineItem {
                product_id: row.get(0)?,
                name: row.get(1)?,
                quantity: row.get(2)?,
            })
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

impl MedicineSource for Database {
    fn medicines_for(&self, prescription_id: &str) -> CollaboratorResult<Vec<MedicineLineItem>> {
        Ok(self.get_medicines(prescription_id)?)
    }
}
