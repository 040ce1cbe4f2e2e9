use crate::{
    AllocationErrors,
    solver::BoundedLeastSquares,
    thruster::Thruster,
    wrench::{Frame, Wrench},
};
use mass_properties::{CenterOfMass, Inertia, MassProperties};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3, Vector6};

/// Result of one allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// Conditioned command per thruster, in thruster order.
    pub commands: Vec<f64>,
    /// Thrust each command actually produces.
    pub thrusts: Vec<f64>,
    /// Requested body force and torque.
    pub target: Vector6<f64>,
    /// Body force and torque the commands produce.
    pub achieved: Vector6<f64>,
}

impl Allocation {
    /// Distance between the requested and produced force/torque. Non-zero
    /// when the demand saturates the thrusters or falls in a deadzone.
    pub fn residual(&self) -> f64 {
        (self.achieved - self.target).norm()
    }

    pub fn force(&self) -> Vector3<f64> {
        self.achieved.fixed_rows::<3>(0).clone_owned()
    }

    pub fn torque(&self) -> Vector3<f64> {
        self.achieved.fixed_rows::<3>(3).clone_owned()
    }
}

/// Maps body-frame acceleration demands onto thruster commands.
///
/// Thrusts are found by bounded weighted least squares,
/// `min |W^1/2 (A t - w)|^2 + lambda |t|^2` with each `t_i` inside the range
/// its thruster can reach. Column `i` of `A` is `(d_i, (p_i - c) x d_i)`, with
/// `c` the center of mass. The small `lambda` term picks the least effort
/// solution when thrusters are redundant. Thrusts are then mapped back through each response curve and
/// conditioned by bounds and deadzone.
#[derive(Debug)]
pub struct Allocator {
    mass_properties: MassProperties,
    thrusters: Vec<Thruster>,
    matrix: DMatrix<f64>,
    weights: Vector6<f64>,
    regularization: f64,
    solver: BoundedLeastSquares,
    // [W^1/2 A; sqrt(lambda) I], rebuilt when weights change
    system: DMatrix<f64>,
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl Allocator {
    pub const DEFAULT_REGULARIZATION: f64 = 1e-8;

    pub fn new(
        mass: f64,
        inertia: Inertia,
        thrusters: Vec<Thruster>,
    ) -> Result<Self, AllocationErrors> {
        // the fields of Inertia are public, so check the tensor again
        let inertia = Inertia::try_from(inertia.matrix())?;
        let mass_properties = MassProperties::new(mass, CenterOfMass::default(), inertia)?;
        if thrusters.is_empty() {
            return Err(AllocationErrors::NoThrusters);
        }

        let n = thrusters.len();
        let matrix = effectiveness(&thrusters, &Vector3::zeros());

        let lower = DVector::from_iterator(n, thrusters.iter().map(|t| t.thrust_range().min));
        let upper = DVector::from_iterator(n, thrusters.iter().map(|t| t.thrust_range().max));

        let mut allocator = Self {
            mass_properties,
            thrusters,
            matrix,
            weights: Vector6::repeat(1.0),
            regularization: Self::DEFAULT_REGULARIZATION,
            solver: BoundedLeastSquares::default(),
            system: DMatrix::zeros(0, 0),
            lower,
            upper,
        };
        allocator.rebuild_system();
        Ok(allocator)
    }

    /// Relative importance of `[fx, fy, fz, tx, ty, tz]` when the demand
    /// cannot be met exactly.
    pub fn with_weights(mut self, weights: [f64; 6]) -> Result<Self, AllocationErrors> {
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(AllocationErrors::InvalidWeight(*w));
        }
        self.weights = Vector6::from(weights);
        self.rebuild_system();
        Ok(self)
    }

    pub fn with_regularization(mut self, lambda: f64) -> Result<Self, AllocationErrors> {
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(AllocationErrors::InvalidRegularization(lambda));
        }
        self.regularization = lambda;
        self.rebuild_system();
        Ok(self)
    }

    /// Moves the point torques are taken about. Thruster positions stay
    /// where the vehicle description puts them.
    pub fn with_center_of_mass(mut self, center_of_mass: CenterOfMass) -> Self {
        self.matrix = effectiveness(&self.thrusters, &center_of_mass.vector());
        self.mass_properties.center_of_mass = center_of_mass;
        self.rebuild_system();
        self
    }

    pub fn with_solver(mut self, solver: BoundedLeastSquares) -> Self {
        self.solver = solver;
        self
    }

    fn rebuild_system(&mut self) {
        let n = self.thrusters.len();
        let mut system = DMatrix::zeros(6 + n, n);
        for r in 0..6 {
            let w = self.weights[r].sqrt();
            for c in 0..n {
                system[(r, c)] = w * self.matrix[(r, c)];
            }
        }
        let s = self.regularization.sqrt();
        for i in 0..n {
            system[(6 + i, i)] = s;
        }
        self.system = system;
    }

    pub fn mass(&self) -> f64 {
        self.mass_properties.mass
    }

    pub fn center_of_mass(&self) -> CenterOfMass {
        self.mass_properties.center_of_mass
    }

    pub fn inertia(&self) -> Matrix3<f64> {
        self.mass_properties.inertia.matrix()
    }

    /// The 6xN map from thrusts to body force and torque.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn thrusters(&self) -> &[Thruster] {
        &self.thrusters
    }

    pub fn thruster_mut(&mut self, index: usize) -> Option<&mut Thruster> {
        self.thrusters.get_mut(index)
    }

    /// Force and torque needed for a body-frame acceleration demand.
    pub fn target(&self, demand: &Wrench) -> Vector6<f64> {
        let force = self.mass_properties.mass * demand.linear();
        let torque = self.inertia() * demand.angular();
        Vector6::new(force[0], force[1], force[2], torque[0], torque[1], torque[2])
    }

    /// Body force and torque produced by a set of thrusts.
    pub fn wrench_of(&self, thrusts: &[f64]) -> Vector6<f64> {
        let w = &self.matrix * DVector::from_column_slice(thrusts);
        Vector6::from_iterator(w.iter().copied())
    }

    /// Computes commands for a body-frame demand. Infeasible demands are not
    /// an error, the closest reachable wrench is returned and the shortfall
    /// shows up in [`Allocation::residual`].
    pub fn allocate(&self, demand: &Wrench) -> Result<Allocation, AllocationErrors> {
        if !demand.is_finite() {
            return Err(AllocationErrors::NonFiniteDemand(*demand));
        }
        if demand.frame != Frame::Body {
            return Err(AllocationErrors::WorldFrameDemand);
        }

        let n = self.thrusters.len();
        let target = self.target(demand);
        let mut rhs = DVector::zeros(6 + n);
        for r in 0..6 {
            rhs[r] = self.weights[r].sqrt() * target[r];
        }

        let thrusts = self
            .solver
            .solve(&self.system, &rhs, &self.lower, &self.upper)?;

        let commands: Vec<f64> = self
            .thrusters
            .iter()
            .zip(thrusts.iter())
            .map(|(thruster, t)| thruster.command_for(*t))
            .collect();
        let realized: Vec<f64> = self
            .thrusters
            .iter()
            .zip(&commands)
            .map(|(thruster, c)| thruster.thrust(*c))
            .collect();
        let achieved = self.wrench_of(&realized);

        let allocation = Allocation {
            commands,
            thrusts: realized,
            target,
            achieved,
        };
        log::trace!(
            "allocated {:?} -> {:?} (residual {:.3e})",
            demand.components(),
            allocation.commands,
            allocation.residual()
        );
        Ok(allocation)
    }

    /// Allocates and sends every command to its thruster.
    pub fn command(&mut self, demand: &Wrench) -> Result<Allocation, AllocationErrors> {
        let allocation = self.allocate(demand)?;
        for (i, (thruster, command)) in self
            .thrusters
            .iter_mut()
            .zip(&allocation.commands)
            .enumerate()
        {
            thruster
                .send(*command)
                .map_err(|e| AllocationErrors::Sink(i, e))?;
        }
        Ok(allocation)
    }

    /// Sends zero to every thruster. Every sink is tried even if an earlier
    /// one fails; the first failure is returned.
    pub fn kill(&mut self) -> Result<(), AllocationErrors> {
        let mut first = None;
        for (i, thruster) in self.thrusters.iter_mut().enumerate() {
            if let Err(e) = thruster.send(0.0) {
                log::error!("failed to stop thruster {i}: {e}");
                if first.is_none() {
                    first = Some(AllocationErrors::Sink(i, e));
                }
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Column `i` is `(d_i, (p_i - center) x d_i)`.
fn effectiveness(thrusters: &[Thruster], center: &Vector3<f64>) -> DMatrix<f64> {
    let mut matrix = DMatrix::zeros(6, thrusters.len());
    for (i, thruster) in thrusters.iter().enumerate() {
        let d = thruster.direction();
        let r = thruster.moment_arm(center);
        matrix
            .column_mut(i)
            .copy_from_slice(&[d[0], d[1], d[2], r[0], r[1], r[2]]);
    }
    matrix
}
