//! Field ownership and per-stage binding.
//!
//! [`FieldSet`] owns every buffer a solver needs. [`FieldSet::bind`] hands a
//! stage exactly the samplers it declares plus the one buffer it renders into,
//! and [`FieldSet::commit`] swaps the written ping-pong pair afterwards.

use crate::error::KernelError;
use crate::field::FieldSlot;
use crate::ping_pong::PingPong;
use crate::stage::{Sampler, StageKind};

/// Read-only inputs bound to one stage invocation.
#[derive(Debug)]
pub struct StageInputs<'a, T> {
    stage: StageKind,
    velocity: Option<&'a T>,
    scratch: Option<&'a T>,
    pressure: Option<&'a T>,
    quantity: Option<&'a T>,
}

impl<'a, T> StageInputs<'a, T> {
    fn select(
        stage: StageKind,
        velocity: Option<&'a T>,
        scratch: Option<&'a T>,
        pressure: Option<&'a T>,
        quantity: Option<&'a T>,
    ) -> Self {
        let declared = stage.samplers();
        let keep = |s: Sampler, v: Option<&'a T>| v.filter(|_| declared.contains(&s));
        Self {
            stage,
            velocity: keep(Sampler::Velocity, velocity),
            scratch: keep(Sampler::Scratch, scratch),
            pressure: keep(Sampler::Pressure, pressure),
            quantity: keep(Sampler::Quantity, quantity),
        }
    }

    /// Input bound to `sampler`, or [`KernelError::MissingBinding`].
    pub fn get(&self, sampler: Sampler) -> Result<&'a T, KernelError> {
        let bound = match sampler {
            Sampler::Velocity => self.velocity,
            Sampler::Scratch => self.scratch,
            Sampler::Pressure => self.pressure,
            Sampler::Quantity => self.quantity,
        };
        bound.ok_or(KernelError::MissingBinding {
            stage: self.stage,
            sampler,
        })
    }

    /// Inputs in the order the stage declares its samplers.
    pub fn ordered(&self) -> Result<Vec<&'a T>, KernelError> {
        self.stage.samplers().iter().map(|s| self.get(*s)).collect()
    }
}

/// Every buffer owned by a solver backend.
#[derive(Debug, Clone)]
pub struct FieldSet<T> {
    velocity: PingPong<T>,
    pressure: PingPong<T>,
    quantity: PingPong<T>,
    scratch: T,
    composite: T,
}

impl<T> FieldSet<T> {
    /// Allocate all eight buffers with `make`.
    pub fn new(mut make: impl FnMut(FieldSlot) -> T) -> Self {
        Self {
            velocity: PingPong::from_fn(|| make(FieldSlot::Velocity)),
            pressure: PingPong::from_fn(|| make(FieldSlot::Pressure)),
            quantity: PingPong::from_fn(|| make(FieldSlot::Quantity)),
            scratch: make(FieldSlot::Scratch),
            composite: make(FieldSlot::Composite),
        }
    }

    /// Committed buffer of `slot`.
    pub fn current(&self, slot: FieldSlot) -> &T {
        match slot {
            FieldSlot::Velocity => self.velocity.readable(),
            FieldSlot::Pressure => self.pressure.readable(),
            FieldSlot::Quantity => self.quantity.readable(),
            FieldSlot::Scratch => &self.scratch,
            FieldSlot::Composite => &self.composite,
        }
    }

    /// Committed buffer of `slot`, for host uploads between frames.
    pub fn current_mut(&mut self, slot: FieldSlot) -> &mut T {
        match slot {
            FieldSlot::Velocity => self.velocity.readable_mut(),
            FieldSlot::Pressure => self.pressure.readable_mut(),
            FieldSlot::Quantity => self.quantity.readable_mut(),
            FieldSlot::Scratch => &mut self.scratch,
            FieldSlot::Composite => &mut self.composite,
        }
    }

    /// Declared inputs of `kind` together with its render target.
    pub fn bind(&mut self, kind: StageKind) -> (StageInputs<'_, T>, &mut T) {
        let FieldSet {
            velocity,
            pressure,
            quantity,
            scratch,
            composite,
        } = self;
        match kind.output() {
            FieldSlot::Velocity => {
                let (read, write) = velocity.split();
                let inputs = StageInputs::select(
                    kind,
                    Some(read),
                    Some(&*scratch),
                    Some(pressure.readable()),
                    Some(quantity.readable()),
                );
                (inputs, write)
            }
            FieldSlot::Pressure => {
                let (read, write) = pressure.split();
                let inputs = StageInputs::select(
                    kind,
                    Some(velocity.readable()),
                    Some(&*scratch),
                    Some(read),
                    Some(quantity.readable()),
                );
                (inputs, write)
            }
            FieldSlot::Quantity => {
                let (read, write) = quantity.split();
                let inputs = StageInputs::select(
                    kind,
                    Some(velocity.readable()),
                    Some(&*scratch),
                    Some(pressure.readable()),
                    Some(read),
                );
                (inputs, write)
            }
            FieldSlot::Scratch => {
                let inputs = StageInputs::select(
                    kind,
                    Some(velocity.readable()),
                    None,
                    Some(pressure.readable()),
                    Some(quantity.readable()),
                );
                (inputs, scratch)
            }
            FieldSlot::Composite => {
                let inputs = StageInputs::select(
                    kind,
                    Some(velocity.readable()),
                    Some(&*scratch),
                    Some(pressure.readable()),
                    Some(quantity.readable()),
                );
                (inputs, composite)
            }
        }
    }

    /// Publish the output of `kind`. Single-buffer slots need no swap.
    pub fn commit(&mut self, kind: StageKind) -> Result<(), KernelError> {
        match kind.output() {
            FieldSlot::Velocity => self.velocity.commit(),
            FieldSlot::Pressure => self.pressure.commit(),
            FieldSlot::Quantity => self.quantity.commit(),
            FieldSlot::Scratch | FieldSlot::Composite => Ok(()),
        }
    }

    /// Apply `f` to every buffer and reset ping-pong roles.
    pub fn reset_with(&mut self, mut f: impl FnMut(&mut T)) {
        self.velocity.reset_with(&mut f);
        self.pressure.reset_with(&mut f);
        self.quantity.reset_with(&mut f);
        f(&mut self.scratch);
        f(&mut self.composite);
    }
}
