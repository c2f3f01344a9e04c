use crate::context::ExecutionContext;
use crate::error::{GanError, Result};
use mnist::MnistBuilder;
use ndarray::prelude::*;
use rand::seq::SliceRandom;
use std::path::Path;

const MNIST_SIDE: usize = 28;
const MNIST_TRAIN_LEN: usize = 60_000;
const MNIST_TEST_LEN: usize = 10_000;
const MNIST_FILES: [&str; 4] = [
    "train-images-idx3-ubyte",
    "train-labels-idx1-ubyte",
    "t10k-images-idx3-ubyte",
    "t10k-labels-idx1-ubyte",
];

/// Labeled images, pixels in [0, 1]. Labels are carried along but training ignores them.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub images: Array3<f32>, // (len, height, width)
    pub labels: Vec<u8>,
}

impl Dataset {
    /// Loads the MNIST training split from the IDX files in `data_dir`.
    pub fn mnist(data_dir: impl AsRef<Path>) -> Result<Dataset> {
        let data_dir = data_dir.as_ref();
        for file in MNIST_FILES {
            if !data_dir.join(file).is_file() {
                return Err(GanError::Dataset(format!(
                    "missing MNIST file {}",
                    data_dir.join(file).display()
                )));
            }
        }
        let base_path = data_dir
            .to_str()
            .ok_or_else(|| GanError::Dataset(format!("non UTF-8 path {}", data_dir.display())))?;

        let mnist = MnistBuilder::new()
            .label_format_digit()
            .base_path(base_path)
            .training_set_length(MNIST_TRAIN_LEN as u32)
            .validation_set_length(0)
            .test_set_length(MNIST_TEST_LEN as u32)
            .finalize();

        let pixels: Vec<f32> = mnist.trn_img.iter().map(|&p| p as f32 / 255.0).collect();
        let images = Array3::from_shape_vec((MNIST_TRAIN_LEN, MNIST_SIDE, MNIST_SIDE), pixels)
            .map_err(|e| GanError::Dataset(format!("MNIST images: {e}")))?;
        Dataset::from_arrays(images, mnist.trn_lbl)
    }

    pub fn from_arrays(images: Array3<f32>, labels: Vec<u8>) -> Result<Dataset> {
        if images.len_of(Axis(0)) != labels.len() {
            return Err(GanError::Dataset(format!(
                "{} images but {} labels",
                images.len_of(Axis(0)),
                labels.len()
            )));
        }
        Ok(Dataset { images, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// (height, width) of one sample.
    pub fn image_shape(&self) -> (usize, usize) {
        let (_, h, w) = self.images.dim();
        (h, w)
    }

    /// Number of full batches in one pass; a short trailing batch is dropped.
    pub fn batches_per_epoch(&self, batch_size: usize) -> usize {
        if batch_size == 0 {
            0
        } else {
            self.len() / batch_size
        }
    }

    /// One shuffled pass over the data in fixed-size batches of (images, labels).
    pub fn epoch_batches<'a>(
        &'a self,
        batch_size: usize,
        ctx: &mut ExecutionContext,
    ) -> impl Iterator<Item = (Array3<f32>, Vec<u8>)> + 'a {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(&mut ctx.rng);

        let batches: Vec<Vec<usize>> = if batch_size == 0 {
            Vec::new()
        } else {
            indices.chunks_exact(batch_size).map(<[usize]>::to_vec).collect()
        };
        batches.into_iter().map(move |batch_indices| {
            let images = self.images.select(Axis(0), &batch_indices);
            let labels = batch_indices.iter().map(|&i| self.labels[i]).collect();
            (images, labels)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn numbered(len: usize) -> Dataset {
        // every pixel of sample i holds i, so batches can be traced back to indices
        let images = Array3::from_shape_fn((len, 2, 2), |(i, _, _)| i as f32);
        let labels = (0..len).map(|i| i as u8).collect();
        Dataset::from_arrays(images, labels).unwrap()
    }

    #[test]
    fn short_final_batch_is_dropped() {
        let dataset = numbered(10);
        let mut ctx = ExecutionContext::new(Some(3));
        let batches: Vec<_> = dataset.epoch_batches(4, &mut ctx).collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(dataset.batches_per_epoch(4), 2);
        assert!(batches.iter().all(|(images, labels)| images.dim() == (4, 2, 2) && labels.len() == 4));
    }

    #[test]
    fn batches_are_a_shuffled_partition() {
        let dataset = numbered(12);
        let mut ctx = ExecutionContext::new(Some(4));
        let mut seen = HashSet::new();
        for (images, labels) in dataset.epoch_batches(3, &mut ctx) {
            for (k, &label) in labels.iter().enumerate() {
                assert_eq!(images[[k, 1, 1]], label as f32);
                assert!(seen.insert(label));
            }
        }
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn mismatched_labels_are_rejected() {
        let err = Dataset::from_arrays(Array3::zeros((3, 2, 2)), vec![0, 1]).unwrap_err();
        assert!(matches!(err, GanError::Dataset(_)));
    }

    #[test]
    fn missing_mnist_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = Dataset::mnist(dir.path()).unwrap_err();
        assert!(err.to_string().contains("train-images-idx3-ubyte"));
    }
}
