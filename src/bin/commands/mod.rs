pub mod csv2mmdb_cmd;

pub use csv2mmdb_cmd::cmd_csv2mmdb;
