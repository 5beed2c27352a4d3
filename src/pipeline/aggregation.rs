use ndarray::{Array3, Axis};

use crate::utils::coordinate::{LandmarkSet, NormalizedLandmark};

/// process_landmarks_samples collapses many landmark sets into one stabilized
/// set. Each coordinate of each landmark is reduced independently across the
/// samples; no joint statistics between axes.
///
/// The landmark count is taken from the first sample. Points missing from a
/// shorter sample contribute 0.
///
/// # Arguments
/// * `samples` - accepted landmark sets, one per frame
/// * `reducer` - robust location estimator, usually `median_with_iqr`
///
/// # Returns
/// * `LandmarkSet` with as many points as the first sample
pub fn process_landmarks_samples<F>(samples: &[LandmarkSet], reducer: F) -> LandmarkSet
where
    F: Fn(&[f32]) -> f32,
{
    match samples.len() {
        0 => return vec![],
        1 => return samples[0].clone(),
        _ => {}
    }

    let num_landmarks = samples[0].len();
    let mut tensor = Array3::<f32>::zeros((samples.len(), num_landmarks, 3));

    for (s, sample) in samples.iter().enumerate() {
        for (i, landmark) in sample.iter().take(num_landmarks).enumerate() {
            tensor[[s, i, 0]] = landmark.x;
            tensor[[s, i, 1]] = landmark.y;
            tensor[[s, i, 2]] = landmark.z;
        }
    }

    let reduced = tensor.map_axis(Axis(0), |lane| match lane.as_slice() {
        Some(values) => reducer(values),
        None => reducer(&lane.to_vec()),
    });

    reduced
        .outer_iter()
        .map(|point| NormalizedLandmark::new(point[0], point[1], point[2]))
        .collect()
}
