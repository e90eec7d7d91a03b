use crate::data::SampleSet;
use crate::error::Result;
use crate::model::PairModel;

/// One validation anchor under inspection.
#[derive(Debug, Clone)]
pub struct ProbeAnchor {
    pub id: String,
    pub features: Vec<f32>,
    pub label: String,
}

/// Nearest-neighbour diagnostic over the model's pair score.
///
/// For each anchor, every sample in the reference set is scored against it
/// and the top-K matches are listed with their labels. Cost is O(V·N)
/// scoring calls, so the anchor set should stay small. Purely diagnostic:
/// no training state is touched.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingProbe {
    top_k: usize,
}

impl EmbeddingProbe {
    /// Probe listing the `top_k` nearest reference samples per anchor.
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Render the nearest-neighbour report for the given anchors.
    ///
    /// Matches are ordered by descending score with ties broken by lowest
    /// reference index; an anchor's own reference entry (same id) is
    /// excluded.
    pub fn report<M: PairModel + ?Sized>(
        &self,
        model: &M,
        anchors: &[ProbeAnchor],
        reference: &SampleSet,
    ) -> Result<String> {
        let mut out = String::new();
        for anchor in anchors {
            let mut scored: Vec<(usize, f32)> = Vec::with_capacity(reference.len());
            for (j, sample) in reference.iter().enumerate() {
                let score = model.pair_score(&anchor.features, &sample.features)?;
                scored.push((j, score));
            }
            scored.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

            out.push_str(&format!("Nearest to {} ({}):\n", anchor.id, anchor.label));
            let mut shown = 0;
            for (j, _) in scored {
                let sample = reference.get(j);
                if sample.id == anchor.id {
                    continue;
                }
                out.push_str(&format!("  {} ({})\n", sample.id, sample.label_or_sentinel()));
                shown += 1;
                if shown == self.top_k {
                    break;
                }
            }
        }
        Ok(out)
    }
}
