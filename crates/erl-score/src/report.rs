use core::fmt;

use crate::erl::ErlScore;

/// Text rendering of an [`ErlScore`].
pub struct ScoreReport<'a> {
    score: &'a ErlScore,
    worst_paths: usize,
}

impl ErlScore {
    pub fn report(&self) -> ScoreReport<'_> {
        ScoreReport {
            score: self,
            worst_paths: 0,
        }
    }
}

impl ScoreReport<'_> {
    /// Also list the `n` paths that lose the most length to errors.
    pub fn worst_paths(mut self, n: usize) -> Self {
        self.worst_paths = n;
        self
    }
}

impl fmt::Display for ScoreReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.score;
        writeln!(f, "ERL:            {:.3}", s.erl)?;
        writeln!(f, "max ERL:        {:.3}", s.max_erl)?;
        writeln!(f, "ratio:          {:.4}", s.ratio())?;
        writeln!(f, "total length:   {:.3}", s.total_length)?;
        writeln!(f, "objects:        {}", s.paths.len())?;
        writeln!(
            f,
            "edges:          {} (correct {}, split {}, merged {}, omitted {})",
            s.num_edges(),
            s.correct,
            s.split,
            s.merged,
            s.omitted
        )?;
        write!(
            f,
            "merged ids:     {} (threshold {})",
            s.merged_segments.len(),
            s.merge_threshold
        )?;
        if !s.merged_segments.is_empty() {
            let ids: Vec<String> = s.merged_segments.iter().map(u64::to_string).collect();
            write!(f, " [{}]", ids.join(", "))?;
        }
        writeln!(f)?;

        if self.worst_paths > 0 {
            let mut paths: Vec<_> = s.paths.iter().filter(|p| p.length > 0.0).collect();
            paths.sort_by(|a, b| (b.length - b.erl).total_cmp(&(a.length - a.erl)));
            writeln!(f, "worst paths:")?;
            for p in paths.into_iter().take(self.worst_paths) {
                writeln!(
                    f,
                    "  object {:>8}  erl {:>10.3} / {:>10.3}  runs {}",
                    p.object,
                    p.erl,
                    p.length,
                    p.runs.len()
                )?;
            }
        }
        Ok(())
    }
}

/// Difference between a score and a previously recorded baseline.
pub struct ScoreComparison<'a> {
    pub baseline: &'a ErlScore,
    pub current: &'a ErlScore,
}

impl ScoreComparison<'_> {
    pub fn erl_delta(&self) -> f64 {
        self.current.erl - self.baseline.erl
    }

    /// True when the graphs have the same length, so the scores are
    /// directly comparable.
    pub fn same_graph(&self) -> bool {
        (self.current.total_length - self.baseline.total_length).abs()
            <= 1e-9 * self.baseline.total_length.max(1.0)
            && self.current.num_edges() == self.baseline.num_edges()
    }
}

impl fmt::Display for ScoreComparison<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (b, c) = (self.baseline, self.current);
        writeln!(
            f,
            "ERL:     {:.3} -> {:.3} ({:+.3})",
            b.erl,
            c.erl,
            self.erl_delta()
        )?;
        writeln!(f, "split:   {} -> {}", b.split, c.split)?;
        writeln!(f, "merged:  {} -> {}", b.merged, c.merged)?;
        write!(f, "omitted: {} -> {}", b.omitted, c.omitted)?;
        if !self.same_graph() {
            write!(f, "\nwarning: baseline was scored on a different graph")?;
        }
        writeln!(f)
    }
}
