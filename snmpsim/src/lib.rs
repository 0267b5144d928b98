//! Runs a scripted SNMP device: the script language and the command line
//! front end around [`snmpsim_core`].

pub mod cli;
pub mod script;
