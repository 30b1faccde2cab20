//! Tests for add and run subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_add_single() {
    match parse(&["fdp", "add", "https://example.com/file.iso"]) {
        CliCommand::Add {
            locators,
            watch,
            daemon,
        } => {
            assert_eq!(locators, vec!["https://example.com/file.iso"]);
            assert!(!watch);
            assert!(!daemon);
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_parse_add_many_with_flags() {
    match parse(&[
        "fdp",
        "add",
        "magnet:?xt=urn:btih:abc",
        "https://example.com/x",
        "--watch",
        "--daemon",
    ]) {
        CliCommand::Add {
            locators,
            watch,
            daemon,
        } => {
            assert_eq!(locators.len(), 2);
            assert_eq!(locators[0], "magnet:?xt=urn:btih:abc");
            assert!(watch);
            assert!(daemon);
        }
        _ => panic!("expected Add with flags"),
    }
}

#[test]
fn cli_add_requires_a_locator() {
    assert!(Cli::try_parse_from(["fdp", "add"]).is_err());
}

#[test]
fn cli_parse_run() {
    match parse(&["fdp", "run"]) {
        CliCommand::Run { watch, daemon } => {
            assert!(!watch);
            assert!(!daemon);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_watch() {
    match parse(&["fdp", "run", "--watch"]) {
        CliCommand::Run { watch, daemon } => {
            assert!(watch);
            assert!(!daemon);
        }
        _ => panic!("expected Run with --watch"),
    }
}
