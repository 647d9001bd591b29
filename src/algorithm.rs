//! Catalog of solution algorithms addressable by integer code.
//!
//! Loading scripts select algorithms with the numeric codes below. The
//! catalog turns a code into a typed [`Algorithm`] whose `Display` output is
//! the solver command syntax, so adapters for text-driven solvers can forward
//! it verbatim.
//!
//! | code | algorithm |
//! |------|-----------|
//! | 0, 1, 2 | `Linear`, `-initial`, `-factorOnce` |
//! | 10, 11, 12 | `Newton`, `-initial`, `-initialThenCurrent` |
//! | 20, 21, 22, 23 | `NewtonLineSearch`, `-type Bisection`, `-type Secant`, `-type RegulaFalsi` |
//! | 30, 31 | `ModifiedNewton`, `-initial` |
//! | 40 ..= 45 | `KrylovNewton` with iterate/increment/maxDim variants |
//! | 50 ..= 53 | `SecantNewton` with iterate/increment variants |
//! | 60 | `BFGS` |
//! | 70 | `Broyden` |
//! | 80 | `PeriodicNewton` |
//! | 90, 91, 92 | user extension slots |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyzeError, Result};

/// Subspace dimension used by the `-maxDim` Krylov variants.
pub const KRYLOV_MAX_DIM: usize = 50;

/// Every code the catalog resolves, in ascending order.
pub const CATALOG_CODES: [u32; 28] = [
    0, 1, 2, 10, 11, 12, 20, 21, 22, 23, 30, 31, 40, 41, 42, 43, 44, 45, 50, 51, 52, 53, 60, 70,
    80, 90, 91, 92,
];

/// Which stiffness the linear algorithm factorizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinearMode {
    Current,
    Initial,
    FactorOnce,
}

/// Tangent used by full Newton iterations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tangent {
    Current,
    Initial,
    InitialThenCurrent,
}

/// Line search flavour for `NewtonLineSearch`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineSearch {
    /// Solver default (interpolated).
    Default,
    Bisection,
    Secant,
    RegulaFalsi,
}

/// Options shared by the accelerated Newton variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acceleration {
    /// Use the initial tangent for iterations.
    pub iterate_initial: bool,
    /// Use the initial tangent for the increment.
    pub increment_initial: bool,
    /// Maximum subspace dimension, solver default when `None`.
    pub max_dim: Option<usize>,
}

/// A user-defined algorithm slot whose behavior is supplied by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtensionSlot {
    Zero,
    One,
    Two,
}

impl ExtensionSlot {
    fn index(self) -> usize {
        match self {
            ExtensionSlot::Zero => 0,
            ExtensionSlot::One => 1,
            ExtensionSlot::Two => 2,
        }
    }
}

impl fmt::Display for ExtensionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserAlgorithm{}", self.index())
    }
}

/// A nonlinear solution algorithm understood by the solver collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    Linear(LinearMode),
    Newton(Tangent),
    NewtonLineSearch(LineSearch),
    ModifiedNewton { initial: bool },
    KrylovNewton(Acceleration),
    SecantNewton(Acceleration),
    Bfgs,
    Broyden,
    PeriodicNewton,
    /// Opaque caller-supplied algorithm, see [`ExtensionRegistry`].
    User(ExtensionSlot),
}

impl Algorithm {
    /// Resolves a catalog code.
    pub fn from_code(code: u32) -> Result<Self> {
        let accelerated = |iterate_initial, increment_initial, max_dim| Acceleration {
            iterate_initial,
            increment_initial,
            max_dim,
        };

        let algorithm = match code {
            0 => Algorithm::Linear(LinearMode::Current),
            1 => Algorithm::Linear(LinearMode::Initial),
            2 => Algorithm::Linear(LinearMode::FactorOnce),
            10 => Algorithm::Newton(Tangent::Current),
            11 => Algorithm::Newton(Tangent::Initial),
            12 => Algorithm::Newton(Tangent::InitialThenCurrent),
            20 => Algorithm::NewtonLineSearch(LineSearch::Default),
            21 => Algorithm::NewtonLineSearch(LineSearch::Bisection),
            22 => Algorithm::NewtonLineSearch(LineSearch::Secant),
            23 => Algorithm::NewtonLineSearch(LineSearch::RegulaFalsi),
            30 => Algorithm::ModifiedNewton { initial: false },
            31 => Algorithm::ModifiedNewton { initial: true },
            40 => Algorithm::KrylovNewton(accelerated(false, false, None)),
            41 => Algorithm::KrylovNewton(accelerated(true, false, None)),
            42 => Algorithm::KrylovNewton(accelerated(false, true, None)),
            43 => Algorithm::KrylovNewton(accelerated(true, true, None)),
            44 => Algorithm::KrylovNewton(accelerated(false, false, Some(KRYLOV_MAX_DIM))),
            45 => Algorithm::KrylovNewton(accelerated(true, true, Some(KRYLOV_MAX_DIM))),
            50 => Algorithm::SecantNewton(accelerated(false, false, None)),
            51 => Algorithm::SecantNewton(accelerated(true, false, None)),
            52 => Algorithm::SecantNewton(accelerated(false, true, None)),
            53 => Algorithm::SecantNewton(accelerated(true, true, None)),
            60 => Algorithm::Bfgs,
            70 => Algorithm::Broyden,
            80 => Algorithm::PeriodicNewton,
            90 => Algorithm::User(ExtensionSlot::Zero),
            91 => Algorithm::User(ExtensionSlot::One),
            92 => Algorithm::User(ExtensionSlot::Two),
            _ => return Err(AnalyzeError::UnknownAlgorithm { code }),
        };
        Ok(algorithm)
    }

    /// Resolves a whole list of codes, failing on the first unknown one.
    pub fn resolve_all(codes: &[u32]) -> Result<Vec<Self>> {
        if codes.is_empty() {
            return Err(AnalyzeError::EmptyAlgorithmList);
        }
        codes.iter().map(|&code| Self::from_code(code)).collect()
    }

    /// Catalog code of this algorithm.
    ///
    /// Returns `None` for accelerated variants the catalog does not list, such
    /// as a secant method with a subspace limit or a Krylov method with a
    /// `max_dim` other than 50.
    pub fn code(&self) -> Option<u32> {
        let accelerated = |base: u32, acc: &Acceleration, max_dim_codes: bool| {
            let offset = match (acc.iterate_initial, acc.increment_initial, acc.max_dim) {
                (false, false, None) => 0,
                (true, false, None) => 1,
                (false, true, None) => 2,
                (true, true, None) => 3,
                (false, false, Some(KRYLOV_MAX_DIM)) if max_dim_codes => 4,
                (true, true, Some(KRYLOV_MAX_DIM)) if max_dim_codes => 5,
                _ => return None,
            };
            Some(base + offset)
        };

        let code = match self {
            Algorithm::Linear(LinearMode::Current) => 0,
            Algorithm::Linear(LinearMode::Initial) => 1,
            Algorithm::Linear(LinearMode::FactorOnce) => 2,
            Algorithm::Newton(Tangent::Current) => 10,
            Algorithm::Newton(Tangent::Initial) => 11,
            Algorithm::Newton(Tangent::InitialThenCurrent) => 12,
            Algorithm::NewtonLineSearch(LineSearch::Default) => 20,
            Algorithm::NewtonLineSearch(LineSearch::Bisection) => 21,
            Algorithm::NewtonLineSearch(LineSearch::Secant) => 22,
            Algorithm::NewtonLineSearch(LineSearch::RegulaFalsi) => 23,
            Algorithm::ModifiedNewton { initial: false } => 30,
            Algorithm::ModifiedNewton { initial: true } => 31,
            Algorithm::KrylovNewton(acc) => return accelerated(40, acc, true),
            Algorithm::SecantNewton(acc) => return accelerated(50, acc, false),
            Algorithm::Bfgs => 60,
            Algorithm::Broyden => 70,
            Algorithm::PeriodicNewton => 80,
            Algorithm::User(slot) => 90 + slot.index() as u32,
        };
        Some(code)
    }

    /// Solver command name without modifiers.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Linear(_) => "Linear",
            Algorithm::Newton(_) => "Newton",
            Algorithm::NewtonLineSearch(_) => "NewtonLineSearch",
            Algorithm::ModifiedNewton { .. } => "ModifiedNewton",
            Algorithm::KrylovNewton(_) => "KrylovNewton",
            Algorithm::SecantNewton(_) => "SecantNewton",
            Algorithm::Bfgs => "BFGS",
            Algorithm::Broyden => "Broyden",
            Algorithm::PeriodicNewton => "PeriodicNewton",
            Algorithm::User(_) => "User",
        }
    }

    /// Returns the extension slot for user algorithms.
    pub fn extension_slot(&self) -> Option<ExtensionSlot> {
        match self {
            Algorithm::User(slot) => Some(*slot),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Algorithm::User(slot) = self {
            return write!(f, "{slot}");
        }

        f.write_str(self.name())?;
        match self {
            Algorithm::Linear(LinearMode::Initial) => f.write_str(" -initial"),
            Algorithm::Linear(LinearMode::FactorOnce) => f.write_str(" -factorOnce"),
            Algorithm::Newton(Tangent::Initial) => f.write_str(" -initial"),
            Algorithm::Newton(Tangent::InitialThenCurrent) => f.write_str(" -initialThenCurrent"),
            Algorithm::NewtonLineSearch(LineSearch::Bisection) => f.write_str(" -type Bisection"),
            Algorithm::NewtonLineSearch(LineSearch::Secant) => f.write_str(" -type Secant"),
            Algorithm::NewtonLineSearch(LineSearch::RegulaFalsi) => {
                f.write_str(" -type RegulaFalsi")
            }
            Algorithm::ModifiedNewton { initial: true } => f.write_str(" -initial"),
            Algorithm::KrylovNewton(acc) | Algorithm::SecantNewton(acc) => {
                if acc.iterate_initial {
                    f.write_str(" -iterate initial")?;
                }
                if acc.increment_initial {
                    f.write_str(" -increment initial")?;
                }
                if let Some(max_dim) = acc.max_dim {
                    write!(f, " -maxDim {max_dim}")?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Callback that installs a user-defined algorithm on the solver.
pub type ExtensionFn<S> = Box<dyn FnMut(&mut S) -> Result<()>>;

/// Table of caller-supplied algorithms for the three [`ExtensionSlot`]s.
pub struct ExtensionRegistry<S> {
    slots: [Option<ExtensionFn<S>>; 3],
}

impl<S> Default for ExtensionRegistry<S> {
    fn default() -> Self {
        Self {
            slots: [None, None, None],
        }
    }
}

impl<S> ExtensionRegistry<S> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the callback for `slot`.
    pub fn register<F>(&mut self, slot: ExtensionSlot, callback: F)
    where
        F: FnMut(&mut S) -> Result<()> + 'static,
    {
        self.slots[slot.index()] = Some(Box::new(callback));
    }

    /// Whether `slot` has a callback.
    pub fn is_registered(&self, slot: ExtensionSlot) -> bool {
        self.slots[slot.index()].is_some()
    }

    /// Checks that every user slot referenced by `algorithms` is registered.
    pub fn ensure_registered(&self, algorithms: &[Algorithm]) -> Result<()> {
        for slot in algorithms.iter().filter_map(Algorithm::extension_slot) {
            if !self.is_registered(slot) {
                return Err(AnalyzeError::MissingExtension { slot });
            }
        }
        Ok(())
    }

    /// Runs the callback registered for `slot` against `solver`.
    pub fn invoke(&mut self, slot: ExtensionSlot, solver: &mut S) -> Result<()> {
        match self.slots[slot.index()].as_mut() {
            Some(callback) => callback(solver),
            None => Err(AnalyzeError::MissingExtension { slot }),
        }
    }
}

impl<S> fmt::Debug for ExtensionRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<String> = [ExtensionSlot::Zero, ExtensionSlot::One, ExtensionSlot::Two]
            .into_iter()
            .filter(|slot| self.is_registered(*slot))
            .map(|slot| slot.to_string())
            .collect();
        f.debug_struct("ExtensionRegistry")
            .field("registered", &registered)
            .finish()
    }
}
