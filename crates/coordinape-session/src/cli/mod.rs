/*
[INPUT]:  Parsed CLI subcommands
[OUTPUT]: Interactive helpers used by the binary
[POS]:    CLI layer - binary-only modules
[UPDATE]: When adding interactive commands
*/

pub mod init;
