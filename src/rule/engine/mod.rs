use std::ops::Range;

use crate::types::*;
use serde::{Deserialize, Serialize};

pub mod composition;

use composition::{BudgetExceeded, Composition, MatchGraph, StepBudget};

/// A composition together with the antipatterns which block its matches.
#[derive(Debug, Serialize, Deserialize)]
pub struct Engine {
    pub(crate) composition: Composition,
    pub(crate) antipatterns: Vec<Composition>,
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

impl Engine {
    pub fn new(composition: Composition, antipatterns: Vec<Composition>) -> Self {
        Engine {
            composition,
            antipatterns,
        }
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    fn antipattern_spans(
        &self,
        tokens: &[&Token],
        budget: &mut StepBudget,
    ) -> Result<Vec<Range<usize>>, BudgetExceeded> {
        let mut spans = Vec::new();

        for antipattern in &self.antipatterns {
            for i in 0..tokens.len() {
                if let Some(graph) = antipattern.apply(tokens, i, budget)? {
                    spans.push(graph.span());
                }
            }
        }

        Ok(spans)
    }

    /// Finds the matches of the composition in the (whitespace-filtered) tokens.
    ///
    /// Start positions are tried left to right. Without `find_all` only the leftmost match is returned,
    /// otherwise scanning resumes at the end of each match so the matches never overlap.
    /// Matches overlapping a match of any antipattern are dropped.
    pub fn get_matches<'t>(
        &self,
        tokens: &'t [&'t Token],
        find_all: bool,
        budget: &mut StepBudget,
    ) -> Result<Vec<MatchGraph<'t>>, BudgetExceeded> {
        let blocked = self.antipattern_spans(tokens, budget)?;
        let mut graphs = Vec::new();

        let mut i = 0;
        while i < tokens.len() {
            let graph = match self.composition.apply(tokens, i, budget)? {
                Some(graph) => graph,
                None => {
                    i += 1;
                    continue;
                }
            };

            let span = graph.span();
            if blocked.iter().any(|x| overlaps(x, &span)) {
                i += 1;
                continue;
            }

            graphs.push(graph);
            if !find_all {
                break;
            }
            i = span.end;
        }

        Ok(graphs)
    }
}
