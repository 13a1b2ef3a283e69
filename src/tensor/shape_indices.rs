use crate::tensor::shape::Shape;

/// Row-major iteration over the indices of a [`Shape`].
#[derive(Clone, Debug)]
pub struct ShapeIndices {
    shape: Shape,
    /// `None` once exhausted
    current: Option<Vec<usize>>,
    started: bool,
    /// Pinned axes as `(axis, value)` pairs
    fixed_indices: Vec<(usize, usize)>,
}

impl ShapeIndices {
    pub(crate) fn new(shape: Shape, fixed_indices: Option<Vec<(usize, usize)>>) -> Self {
        let current = if shape.volume() == 0 {
            None
        } else {
            Some(vec![0; shape.rank()])
        };

        Self {
            shape,
            current,
            started: false,
            fixed_indices: fixed_indices.unwrap_or_default(),
        }
    }

    /// Advances to the next index in row-major order.
    fn next_inner(&mut self) -> Option<Vec<usize>> {
        if !self.started {
            self.started = true;
            return self.current.clone();
        }

        let next = self.current.as_mut()?;
        for i in (0..next.len()).rev() {
            if next[i] + 1 < self.shape.dims()[i] {
                next[i] += 1;
                return Some(next.clone());
            }
            next[i] = 0;
        }

        self.current = None;
        None
    }

    fn matches_fixed(&self, index: &[usize]) -> bool {
        self.fixed_indices
            .iter()
            .all(|(axis, expected)| index.get(*axis) == Some(expected))
    }
}

impl Iterator for ShapeIndices {
    type Item = Vec<usize>;

    // NOTE: walks every index and filters on the pinned axes
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let candidate = self.next_inner()?;
            if self.matches_fixed(&candidate) {
                return Some(candidate);
            }
        }
    }
}
