//! The engine value: configuration, buffer manager, and catalog.
//!
//! Executors receive these as explicit references; there are no
//! process-wide globals, so tests construct an `Engine` over a scratch
//! directory and drive it line by line.

use crate::executors;
use crate::parser::{parse, tokenize};
use crate::query::ParsedQuery;
use cairn_buffer::BufferManager;
use cairn_common::{CairnError, EngineConfig, Result};
use cairn_storage::Catalog;
use std::fs;

/// What a query execution produced.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A status or listing to show the user (may span lines).
    Message(String),
    /// The session should end.
    Quit,
}

/// A fully assembled engine instance.
pub struct Engine {
    config: EngineConfig,
    buffer: BufferManager,
    catalog: Catalog,
}

impl Engine {
    /// Creates an engine over the configured data directory, creating the
    /// directory layout as needed.
    pub fn new(config: EngineConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let buffer = BufferManager::new(config.temp_dir(), config.block_count)?;
        Ok(Self {
            config,
            buffer,
            catalog: Catalog::new(),
        })
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The catalog of live tables.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The buffer manager.
    pub fn buffer(&self) -> &BufferManager {
        &self.buffer
    }

    /// Tokenizes, parses, and executes one input line. Blank lines yield
    /// `None` without touching the parser.
    pub fn execute_line(&mut self, line: &str) -> Result<Option<Outcome>> {
        let tokens = tokenize(line);
        if tokens.is_empty() {
            return Ok(None);
        }
        let query = parse(&tokens)?;
        self.execute(query).map(Some)
    }

    /// Executes a parsed query.
    pub fn execute(&mut self, query: ParsedQuery) -> Result<Outcome> {
        match query {
            ParsedQuery::Source { script } => self.run_script(&script),
            ParsedQuery::Quit => Ok(Outcome::Quit),
            query => {
                let message =
                    executors::dispatch(&self.config, &self.buffer, &mut self.catalog, query)?;
                Ok(Outcome::Message(message))
            }
        }
    }

    /// Runs `<data>/<name>.ra` line by line. A failing line is reported
    /// and the script continues; QUIT inside a script ends the session.
    fn run_script(&mut self, name: &str) -> Result<Outcome> {
        let path = self.config.script_path(name);
        let text = fs::read_to_string(&path).map_err(|_| {
            CairnError::Semantic(format!("no script '{name}' at {}", path.display()))
        })?;

        let mut lines_out = Vec::new();
        for line in text.lines() {
            match self.execute_line(line) {
                Ok(None) => {}
                Ok(Some(Outcome::Message(message))) => lines_out.push(message),
                Ok(Some(Outcome::Quit)) => return Ok(Outcome::Quit),
                Err(e) => lines_out.push(e.to_string()),
            }
        }
        Ok(Outcome::Message(lines_out.join("\n")))
    }
}
