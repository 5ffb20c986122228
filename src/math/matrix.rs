use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::Index;

use crate::error::{NnError, Result};

/// Dense row-major matrix of `f64`.
///
/// The shape is fixed once built. Every arithmetic method checks shapes and
/// returns a fresh matrix; only `set`, `set_at`, `randomize` and
/// `add_assign` write into `self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Zero-filled `rows × cols` matrix. Both dimensions must be positive.
    pub fn new(rows: usize, cols: usize) -> Result<Matrix> {
        Matrix::element_count(rows, cols)?;
        Ok(Matrix::zeros(rows, cols))
    }

    /// `rows * cols` for a shape that is non-empty and addressable.
    pub(crate) fn element_count(rows: usize, cols: usize) -> Result<usize> {
        if rows == 0 || cols == 0 {
            return Err(NnError::InvalidShape(format!(
                "matrix dimensions must be positive, got {rows}x{cols}"
            )));
        }
        rows.checked_mul(cols)
            .ok_or_else(|| NnError::InvalidShape(format!("{rows}x{cols} matrix is too large")))
    }

    /// Zero-filled matrix without the positivity check; for shapes derived
    /// from matrices that already exist.
    pub(crate) fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Matrix> {
        let len = Matrix::element_count(rows, cols)?;
        if data.len() != len {
            return Err(NnError::InvalidShape(format!(
                "{rows}x{cols} matrix needs {len} values, got {}",
                data.len()
            )));
        }
        Ok(Matrix { rows, cols, data })
    }

    /// Builds a matrix from nested rows. Rows must be non-empty and equally long.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Matrix> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|r| r.len() != cols) {
            return Err(NnError::InvalidShape(format!(
                "row {bad} has {} values, expected {cols}",
                rows[bad].len()
            )));
        }
        Matrix::from_vec(rows.len(), cols, rows.concat())
    }

    /// Uniform random matrix in [-1, 1).
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        res.fill_uniform(Uniform::new(-1.0, 1.0), rng);
        res
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // Both uniforms live in (0, 1] so ln() never sees zero.
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn normal<R: Rng + ?Sized>(rows: usize, cols: usize, std_dev: f64, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        for v in res.data.iter_mut() {
            *v = Matrix::sample_standard_normal(rng) * std_dev;
        }
        res
    }

    /// He initialization: samples from N(0, sqrt(2 / cols)).
    ///
    /// Recommended before ReLU layers. `cols` is the fan-in.
    pub fn he<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        Matrix::normal(rows, cols, (2.0 / cols as f64).sqrt(), rng)
    }

    /// Xavier (Glorot) initialization: samples from N(0, sqrt(1 / cols)).
    ///
    /// Recommended before Sigmoid/Tanh/Identity layers. `cols` is the fan-in.
    pub fn xavier<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        Matrix::normal(rows, cols, (1.0 / cols as f64).sqrt(), rng)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Row-major view of the backing store.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn set_at(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            return Err(NnError::mismatch("set_at", self.shape(), (row + 1, col + 1)));
        }
        self.data[row * self.cols + col] = value;
        Ok(())
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Replaces every value. `values` must have exactly this matrix's shape.
    pub fn set(&mut self, values: &[Vec<f64>]) -> Result<()> {
        let cols = values.first().map(|r| r.len()).unwrap_or(0);
        let ragged = values.iter().any(|r| r.len() != cols);
        if ragged || values.len() != self.rows || cols != self.cols {
            return Err(NnError::mismatch("set", self.shape(), (values.len(), cols)));
        }
        for (dst, src) in self.data.chunks_mut(self.cols).zip(values) {
            dst.copy_from_slice(src);
        }
        Ok(())
    }

    /// Fills the matrix with uniform values in `[low, high)`.
    pub fn randomize<R: Rng + ?Sized>(&mut self, low: f64, high: f64, rng: &mut R) -> Result<()> {
        if !(low < high && low.is_finite() && high.is_finite()) {
            return Err(NnError::InvalidConfig(format!(
                "randomize needs a finite range with low < high, got [{low}, {high})"
            )));
        }
        self.fill_uniform(Uniform::new(low, high), rng);
        Ok(())
    }

    fn fill_uniform<R: Rng + ?Sized>(&mut self, dist: Uniform<f64>, rng: &mut R) {
        for v in self.data.iter_mut() {
            *v = dist.sample(rng);
        }
    }

    fn check_same_shape(&self, other: &Matrix, op: &'static str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(NnError::mismatch(op, self.shape(), other.shape()));
        }
        Ok(())
    }

    fn zip_with<F>(&self, other: &Matrix, op: &'static str, f: F) -> Result<Matrix>
    where
        F: Fn(f64, f64) -> f64,
    {
        self.check_same_shape(other, op)?;
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| f(a, b))
            .collect();
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_with(other, "add", |a, b| a + b)
    }

    pub fn subtract(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_with(other, "subtract", |a, b| a - b)
    }

    /// Element-wise (Hadamard) product.
    pub fn hadamard(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_with(other, "hadamard", |a, b| a * b)
    }

    /// In-place element-wise sum, used to reduce gradient shards.
    pub fn add_assign(&mut self, other: &Matrix) -> Result<()> {
        self.check_same_shape(other, "add_assign")?;
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += b;
        }
        Ok(())
    }

    pub fn multiply(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(NnError::mismatch("multiply", self.shape(), other.shape()));
        }

        let mut res = Matrix::zeros(self.rows, other.cols);

        for i in 0..self.rows {
            let lhs = self.row(i);
            let out = &mut res.data[i * other.cols..(i + 1) * other.cols];
            for (k, &a) in lhs.iter().enumerate() {
                for (o, &b) in out.iter_mut().zip(other.row(k)) {
                    *o += a * b;
                }
            }
        }

        Ok(res)
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);

        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }

        res
    }

    pub fn scale(&self, k: f64) -> Matrix {
        self.map(|x| x * k)
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// Adds a `cols × 1` column vector to every row (bias broadcast over a batch).
    pub fn add_column_broadcast(&self, column: &Matrix) -> Result<Matrix> {
        if column.cols != 1 || column.rows != self.cols {
            return Err(NnError::mismatch("add_column_broadcast", self.shape(), column.shape()));
        }
        let mut res = self.clone();
        for row in res.data.chunks_mut(self.cols) {
            for (v, b) in row.iter_mut().zip(column.data.iter()) {
                *v += b;
            }
        }
        Ok(res)
    }

    /// Sums every column into a `cols × 1` vector.
    pub fn column_sums(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, 1);
        for row in self.data.chunks(self.cols) {
            for (acc, v) in res.data.iter_mut().zip(row) {
                *acc += v;
            }
        }
        res
    }

    /// Copies the given rows, in order, into a new matrix.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Matrix> {
        if indices.is_empty() {
            return Err(NnError::InvalidShape("cannot select zero rows".to_string()));
        }
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            if i >= self.rows {
                return Err(NnError::mismatch("select_rows", self.shape(), (i + 1, self.cols)));
            }
            data.extend_from_slice(self.row(i));
        }
        Ok(Matrix {
            rows: indices.len(),
            cols: self.cols,
            data,
        })
    }

    /// Copies rows `start..end` into a new matrix.
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<Matrix> {
        if start >= end || end > self.rows {
            return Err(NnError::mismatch("slice_rows", self.shape(), (end, self.cols)));
        }
        Ok(Matrix {
            rows: end - start,
            cols: self.cols,
            data: self.data[start * self.cols..end * self.cols].to_vec(),
        })
    }

    /// True when shapes agree and every pair of values is within `tol`.
    pub fn approx_eq(&self, other: &Matrix, tol: f64) -> bool {
        self.shape() == other.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| (a - b).abs() <= tol)
    }

    /// Whether the backing store length agrees with the declared shape.
    /// Only deserialized matrices can violate this.
    pub(crate) fn is_well_formed(&self) -> bool {
        self.rows > 0 && self.cols > 0 && self.rows.checked_mul(self.cols) == Some(self.data.len())
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        assert!(row < self.rows && col < self.cols, "index ({row}, {col}) out of bounds");
        &self.data[row * self.cols + col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn m(rows: &[&[f64]]) -> Matrix {
        Matrix::from_rows(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn new_rejects_empty_dimensions() {
        assert!(matches!(Matrix::new(0, 3), Err(NnError::InvalidShape(_))));
        assert!(matches!(Matrix::new(2, 0), Err(NnError::InvalidShape(_))));
        let z = Matrix::new(2, 3).unwrap();
        assert_eq!(z.shape(), (2, 3));
        assert!(z.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        assert!(matches!(Matrix::from_vec(usize::MAX, 2, vec![1.0]), Err(NnError::InvalidShape(_))));
        assert!(matches!(Matrix::new(usize::MAX, usize::MAX), Err(NnError::InvalidShape(_))));

        let huge = Matrix { rows: 1 << 33, cols: 1 << 33, data: vec![0.0] };
        assert!(!huge.is_well_formed());
    }

    #[test]
    fn multiply_matches_hand_result() {
        let a = m(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        let b = m(&[&[7.0, 8.0], &[9.0, 10.0], &[11.0, 12.0]]);
        let c = a.multiply(&b).unwrap();
        assert_eq!(c, m(&[&[58.0, 64.0], &[139.0, 154.0]]));
    }

    #[test]
    fn product_transpose_identity() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let a = Matrix::random(3, 4, &mut rng);
            let b = Matrix::random(4, 5, &mut rng);
            let lhs = a.multiply(&b).unwrap().transpose();
            let rhs = b.transpose().multiply(&a.transpose()).unwrap();
            assert!(lhs.approx_eq(&rhs, 1e-12));
        }
    }

    #[test]
    fn double_transpose_and_identity_map_are_noops() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = Matrix::random(5, 2, &mut rng);
        assert_eq!(a.transpose().transpose(), a);
        assert_eq!(a.map(|x| x), a);
        assert_eq!(a.transpose().shape(), (2, 5));
    }

    #[test]
    fn mismatched_operands_fail() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 2);
        assert!(matches!(a.multiply(&b), Err(NnError::ShapeMismatch { op: "multiply", .. })));
        assert!(matches!(a.add(&b), Err(NnError::ShapeMismatch { op: "add", .. })));
        assert!(matches!(a.subtract(&b), Err(NnError::ShapeMismatch { .. })));
        assert!(matches!(a.hadamard(&b), Err(NnError::ShapeMismatch { .. })));
    }

    #[test]
    fn set_checks_shape_and_replaces_values() {
        let mut a = Matrix::new(2, 2).unwrap();
        a.set(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(a[(1, 0)], 3.0);
        assert!(a.set(&[vec![1.0, 2.0, 3.0]]).is_err());
        assert!(a.set(&[vec![1.0], vec![2.0, 3.0]]).is_err());
    }

    #[test]
    fn randomize_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut a = Matrix::zeros(10, 10);
        a.randomize(-0.5, 0.25, &mut rng).unwrap();
        assert!(a.as_slice().iter().all(|&v| (-0.5..0.25).contains(&v)));
        assert!(a.randomize(1.0, 1.0, &mut rng).is_err());
    }

    #[test]
    fn bias_broadcast_and_column_sums() {
        let a = m(&[&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0]]);
        let bias = Matrix::from_vec(2, 1, vec![10.0, 20.0]).unwrap();
        let b = a.add_column_broadcast(&bias).unwrap();
        assert_eq!(b.row(2), &[15.0, 26.0]);
        assert_eq!(a.column_sums().as_slice(), &[9.0, 12.0]);
        assert!(a.add_column_broadcast(&Matrix::zeros(3, 1)).is_err());
    }

    #[test]
    fn select_rows_copies_in_order() {
        let a = m(&[&[1.0], &[2.0], &[3.0]]);
        let s = a.select_rows(&[2, 0]).unwrap();
        assert_eq!(s.as_slice(), &[3.0, 1.0]);
        assert!(a.select_rows(&[3]).is_err());
        assert_eq!(a.slice_rows(1, 3).unwrap().as_slice(), &[2.0, 3.0]);
    }

    #[test]
    fn copies_do_not_alias() {
        let a = m(&[&[1.0, 2.0]]);
        let mut b = a.clone();
        b.set_at(0, 0, 9.0).unwrap();
        assert_eq!(a[(0, 0)], 1.0);
        assert_eq!(b.get(0, 0), Some(9.0));
        assert_eq!(b.get(1, 0), None);
    }
}
