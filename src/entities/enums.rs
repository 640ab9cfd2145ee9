//! Enumerazioni - Tipi enumerati utilizzati nelle entità

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
pub enum MessageType {
    Text,
    Image,
    File,
}
