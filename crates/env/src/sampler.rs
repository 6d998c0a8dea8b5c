//! Scene sampler.

use neuralese_core::{Scene, SceneError, SceneObject, Vocabulary};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors that make sampling impossible.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SamplerError {
    /// Scenes need at least one object.
    #[error("k must be at least 1")]
    ZeroObjects,

    /// Not enough distinct attribute tuples for `k` objects.
    #[error("vocabulary yields {available} distinct objects, scene needs {needed}")]
    VocabularyTooSmall {
        /// Objects per scene
        needed: usize,
        /// Distinct tuples the vocabulary allows
        available: usize,
    },

    /// A batch of zero scenes was requested.
    #[error("batch size must be at least 1")]
    EmptyBatch,

    /// The drawn objects did not form a valid scene.
    #[error("invalid scene: {0}")]
    Scene(#[from] SceneError),
}

/// Draw one scene of `k` pairwise-distinct objects with a uniform target.
pub fn sample_scene<R: Rng + ?Sized>(
    vocabulary: &Vocabulary,
    k: usize,
    rng: &mut R,
) -> Result<Scene, SamplerError> {
    if k == 0 {
        return Err(SamplerError::ZeroObjects);
    }
    let available = vocabulary.distinct_objects();
    if k > available {
        return Err(SamplerError::VocabularyTooSmall {
            needed: k,
            available,
        });
    }

    // Sample tuple indices without replacement, then decode each into
    // (color, shape, size) in mixed radix.
    let per_color = vocabulary.shapes.len() * vocabulary.sizes.len();
    let objects: Vec<SceneObject> = index::sample(rng, available, k)
        .into_iter()
        .map(|i| {
            let color = &vocabulary.colors[i / per_color];
            let rest = i % per_color;
            let shape = &vocabulary.shapes[rest / vocabulary.sizes.len()];
            let size = &vocabulary.sizes[rest % vocabulary.sizes.len()];
            SceneObject::new(color.as_str(), shape.as_str(), size.as_str())
        })
        .collect();
    let target_idx = rng.gen_range(0..k);

    // repeated values inside one attribute list surface here
    Ok(Scene::new(objects, target_idx)?)
}

/// Draw `batch_size` independent scenes.
pub fn sample_batch<R: Rng + ?Sized>(
    vocabulary: &Vocabulary,
    batch_size: usize,
    k: usize,
    rng: &mut R,
) -> Result<Vec<Scene>, SamplerError> {
    if batch_size == 0 {
        return Err(SamplerError::EmptyBatch);
    }
    let scenes = (0..batch_size)
        .map(|_| sample_scene(vocabulary, k, rng))
        .collect::<Result<Vec<_>, _>>()?;
    debug!("Sampled {} scenes of {} objects", scenes.len(), k);
    Ok(scenes)
}

/// A vocabulary and scene size bundled for repeated sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSampler {
    /// Attribute values
    pub vocabulary: Vocabulary,
    /// Objects per scene
    pub k: usize,
}

impl SceneSampler {
    /// Create a sampler.
    pub fn new(vocabulary: Vocabulary, k: usize) -> Self {
        Self { vocabulary, k }
    }

    /// Draw a batch.
    pub fn batch<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Vec<Scene>, SamplerError> {
        sample_batch(&self.vocabulary, batch_size, self.k, rng)
    }
}

impl Default for SceneSampler {
    fn default() -> Self {
        Self::new(Vocabulary::default(), 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn small_vocab() -> Vocabulary {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        Vocabulary {
            colors: owned(&["red", "blue", "green"]),
            shapes: owned(&["circle", "square", "triangle"]),
            sizes: owned(&["small", "medium", "large"]),
        }
    }

    #[test]
    fn test_scene_generation() {
        let mut rng = StdRng::seed_from_u64(7);
        let scene = sample_scene(&small_vocab(), 3, &mut rng).unwrap();
        assert_eq!(scene.len(), 3);
        assert!(scene.target_idx() < 3);
        let distinct: HashSet<_> = scene.objects().iter().collect();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn test_batch_generation() {
        let mut rng = StdRng::seed_from_u64(1);
        let batch = sample_batch(&small_vocab(), 5, 3, &mut rng).unwrap();
        assert_eq!(batch.len(), 5);
        assert!(batch.iter().all(|s| s.len() == 3));
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let sampler = SceneSampler::default();
        let a = sampler.batch(10, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = sampler.batch(10, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_k_equal_to_vocabulary_size() {
        let mut rng = StdRng::seed_from_u64(3);
        let scene = sample_scene(&small_vocab(), 27, &mut rng).unwrap();
        assert_eq!(scene.len(), 27);
    }

    #[test]
    fn test_sampling_errors() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            sample_scene(&small_vocab(), 28, &mut rng),
            Err(SamplerError::VocabularyTooSmall {
                needed: 28,
                available: 27
            })
        );
        assert_eq!(sample_scene(&small_vocab(), 0, &mut rng), Err(SamplerError::ZeroObjects));
        assert_eq!(
            sample_batch(&small_vocab(), 0, 3, &mut rng),
            Err(SamplerError::EmptyBatch)
        );
    }
}
