use std::borrow::Cow;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{IrError, IrResult};
use crate::ir::op::{expect_inputs, Op, Validation};
use crate::tensor::{DatumType, TValue, Tensor};

/// Zeroes each element with probability `ratio` and scales the survivors by
/// `1 / (1 - ratio)`. The second output is the boolean keep-mask.
///
/// The draw is seeded, but the operator still declares [`Validation::Random`]:
/// other implementations are free to draw differently.
#[derive(Debug, Clone, PartialEq)]
pub struct Dropout {
    ratio: f32,
    seed: u64,
}

fn check_ratio(ratio: f32) -> IrResult<()> {
    if !(0.0..1.0).contains(&ratio) {
        return Err(IrError::msg(format!(
            "dropout ratio must lie in [0, 1), got {ratio}"
        )));
    }
    Ok(())
}

impl Dropout {
    pub fn new(ratio: f32, seed: u64) -> IrResult<Dropout> {
        check_ratio(ratio)?;
        Ok(Dropout { ratio, seed })
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn set_ratio(&mut self, ratio: f32) -> IrResult<()> {
        check_ratio(ratio)?;
        self.ratio = ratio;
        Ok(())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Op for Dropout {
    fn name(&self) -> Cow<'_, str> {
        "Dropout".into()
    }

    fn validation(&self) -> Validation {
        Validation::Random
    }

    fn same_as(&self, other: &dyn Op) -> bool {
        other.downcast_ref::<Dropout>() == Some(self)
    }

    fn input_arity(&self) -> usize {
        1
    }

    fn output_arity(&self) -> usize {
        2
    }

    fn eval(&self, inputs: Vec<TValue>) -> IrResult<Vec<TValue>> {
        let [input] = expect_inputs::<1>(self, inputs)?;
        if input.dtype() != DatumType::F32 {
            return Err(IrError::UnsupportedDatum {
                dtype: input.dtype(),
                context: "Dropout".into(),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let scale = 1.0 / (1.0 - self.ratio);
        let (values, mask): (Vec<f32>, Vec<bool>) = input
            .to_vec::<f32>()?
            .into_iter()
            .map(|x| {
                let keep = rng.random::<f32>() >= self.ratio;
                (if keep { x * scale } else { 0.0 }, keep)
            })
            .unzip();

        let mask = Tensor::from_vec(input.shape().clone(), mask)?;
        let mut output = input.into_tensor();
        output.assign(&values)?;
        Ok(vec![output.into(), mask.into()])
    }

    fn info(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dropout(ratio={}, seed={})", self.ratio, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ones(n: usize) -> TValue {
        Tensor::from_vec(vec![n], vec![1f32; n]).unwrap().into()
    }

    #[test]
    fn test_dropout_masks_and_scales() {
        let op = Dropout::new(0.5, 42).unwrap();
        let out = op.eval(vec![ones(64)]).unwrap();
        assert_eq!(out.len(), 2);
        let values = out[0].to_vec::<f32>().unwrap();
        let mask = out[1].to_vec::<bool>().unwrap();
        assert_eq!(out[1].dtype(), DatumType::Bool);
        for (v, keep) in values.iter().zip(&mask) {
            assert_eq!(*v, if *keep { 2.0 } else { 0.0 });
        }
        assert!(mask.iter().any(|k| *k));
        assert!(mask.iter().any(|k| !*k));
    }

    #[test]
    fn test_same_seed_same_draw() {
        let op = Dropout::new(0.3, 7).unwrap();
        let a = op.eval(vec![ones(16)]).unwrap();
        let b = op.clone().eval(vec![ones(16)]).unwrap();
        assert_eq!(a[1], b[1]);
    }

    #[test]
    fn test_zero_ratio_keeps_everything() {
        let out = Dropout::new(0.0, 1).unwrap().eval(vec![ones(8)]).unwrap();
        assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![1.0; 8]);
    }

    #[test]
    fn test_ratio_bounds() {
        assert!(Dropout::new(1.0, 0).is_err());
        assert!(Dropout::new(-0.1, 0).is_err());
        let mut op = Dropout::new(0.1, 0).unwrap();
        assert!(op.set_ratio(2.0).is_err());
        assert_eq!(op.ratio(), 0.1);
        assert_eq!(op.validation(), Validation::Random);
    }
}
