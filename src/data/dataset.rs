use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;

/// Source of training and test pairs; one sample per row.
pub trait Dataset {
    fn train_inputs(&self) -> &Matrix;
    fn train_labels(&self) -> &Matrix;
    fn test_inputs(&self) -> &Matrix;
    fn test_labels(&self) -> &Matrix;

    /// Inputs and their labels must have the same number of rows.
    fn validate(&self) -> Result<()> {
        for (what, x, y) in [
            ("training pair", self.train_inputs(), self.train_labels()),
            ("test pair", self.test_inputs(), self.test_labels()),
        ] {
            if x.rows() != y.rows() {
                return Err(NnError::mismatch(what, x.shape(), y.shape()));
            }
        }
        if self.train_inputs().cols() != self.test_inputs().cols()
            || self.train_labels().cols() != self.test_labels().cols()
        {
            return Err(NnError::mismatch(
                "train/test widths",
                (self.train_inputs().cols(), self.train_labels().cols()),
                (self.test_inputs().cols(), self.test_labels().cols()),
            ));
        }
        Ok(())
    }
}

/// Every `bits`-wide binary word, most significant bit first, one per row.
fn all_words(bits: usize) -> Vec<Vec<f64>> {
    (0..1usize << bits)
        .map(|n| (0..bits).rev().map(|b| ((n >> b) & 1) as f64).collect())
        .collect()
}

fn parity(word: &[f64], positions: &[usize]) -> f64 {
    let ones = positions.iter().filter(|&&p| word[p] > 0.5).count();
    (ones % 2) as f64
}

/// Two-bit XOR truth table. Train and test sets are the same four rows.
pub struct XorDataset {
    inputs: Matrix,
    labels: Matrix,
}

impl XorDataset {
    pub fn new() -> Result<XorDataset> {
        let words = all_words(2);
        let labels: Vec<Vec<f64>> = words.iter().map(|w| vec![parity(w, &[0, 1])]).collect();
        Ok(XorDataset {
            inputs: Matrix::from_rows(&words)?,
            labels: Matrix::from_rows(&labels)?,
        })
    }
}

impl Dataset for XorDataset {
    fn train_inputs(&self) -> &Matrix {
        &self.inputs
    }
    fn train_labels(&self) -> &Matrix {
        &self.labels
    }
    fn test_inputs(&self) -> &Matrix {
        &self.inputs
    }
    fn test_labels(&self) -> &Matrix {
        &self.labels
    }
}

/// Parity of all 16 four-bit words. Train and test sets are identical:
/// the domain is finite, so fitting it exactly is the point.
pub struct FourBitXorDataset {
    inputs: Matrix,
    labels: Matrix,
}

impl FourBitXorDataset {
    pub fn new() -> Result<FourBitXorDataset> {
        let words = all_words(4);
        let labels: Vec<Vec<f64>> = words.iter().map(|w| vec![parity(w, &[0, 1, 2, 3])]).collect();
        Ok(FourBitXorDataset {
            inputs: Matrix::from_rows(&words)?,
            labels: Matrix::from_rows(&labels)?,
        })
    }
}

impl Dataset for FourBitXorDataset {
    fn train_inputs(&self) -> &Matrix {
        &self.inputs
    }
    fn train_labels(&self) -> &Matrix {
        &self.labels
    }
    fn test_inputs(&self) -> &Matrix {
        &self.inputs
    }
    fn test_labels(&self) -> &Matrix {
        &self.labels
    }
}

/// Data positions covered by each of the four Hamming(15,11) parity bits.
const HAMMING_PARITY: [&[usize]; 4] = [
    &[0, 1, 3, 4, 6, 8, 10],
    &[0, 2, 3, 5, 6, 9, 10],
    &[1, 2, 3, 7, 8, 9, 10],
    &[4, 5, 6, 7, 8, 9, 10],
];

pub const HAMMING_WORDS: usize = 2048;
pub const HAMMING_TEST_ROWS: usize = 48;

/// All 2048 eleven-bit data words labelled with their four Hamming parity
/// bits, split into 2000 training and 48 test rows by a seeded shuffle.
pub struct HammingCodeDataset {
    train_inputs: Matrix,
    train_labels: Matrix,
    test_inputs: Matrix,
    test_labels: Matrix,
}

impl HammingCodeDataset {
    pub fn new(seed: u64) -> Result<HammingCodeDataset> {
        let words = all_words(11);
        let labels: Vec<Vec<f64>> = words
            .iter()
            .map(|w| HAMMING_PARITY.iter().map(|p| parity(w, p)).collect())
            .collect();
        let inputs = Matrix::from_rows(&words)?;
        let labels = Matrix::from_rows(&labels)?;

        let mut order: Vec<usize> = (0..HAMMING_WORDS).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        let (test, train) = order.split_at(HAMMING_TEST_ROWS);

        Ok(HammingCodeDataset {
            train_inputs: inputs.select_rows(train)?,
            train_labels: labels.select_rows(train)?,
            test_inputs: inputs.select_rows(test)?,
            test_labels: labels.select_rows(test)?,
        })
    }
}

impl Dataset for HammingCodeDataset {
    fn train_inputs(&self) -> &Matrix {
        &self.train_inputs
    }
    fn train_labels(&self) -> &Matrix {
        &self.train_labels
    }
    fn test_inputs(&self) -> &Matrix {
        &self.test_inputs
    }
    fn test_labels(&self) -> &Matrix {
        &self.test_labels
    }
}
