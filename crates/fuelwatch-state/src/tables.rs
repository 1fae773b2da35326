//! redb table definitions for the fuelwatch state store.
//!
//! Record tables use `u64` keys (assigned from [`SEQUENCES`]) and `&[u8]`
//! values holding JSON-serialized domain types. Key order is therefore
//! insertion order.

use redb::TableDefinition;

/// Vehicles keyed by vehicle id.
pub const VEHICLES: TableDefinition<u64, &[u8]> = TableDefinition::new("vehicles");

/// Stations keyed by station id.
pub const STATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("stations");

/// Last assigned id per record table, keyed by table name.
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");
