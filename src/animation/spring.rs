// 文件: animation/spring.rs
// 作用: 阻尼谐振子的解析解：给定当前位移和速度，求经过 dt 之后的位移和速度。
//       使用解析解而不是数值积分，所以帧间隔抖动不会影响结果。

use std::time::Duration;

use oscilla_config::SpringConfig;

/// Physical parameters of a damped spring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringParams {
    pub damping: f64,
    pub mass: f64,
    pub stiffness: f64,
}

/// Position and velocity of the spring relative to its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    /// Displacement from the target value.
    pub displacement: f64,
    pub velocity: f64,
}

/// Damping regime of a set of parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Underdamped,
    Critical,
    Overdamped,
}

impl SpringParams {
    pub fn new(damping: f64, mass: f64, stiffness: f64) -> Self {
        Self {
            damping,
            mass,
            stiffness,
        }
    }

    /// Parameters to integrate with for a config, with overdamping clamped if disallowed.
    pub fn from_config(config: &SpringConfig) -> Self {
        Self::new(config.effective_damping(), config.mass, config.stiffness)
    }

    /// Damping ratio ζ = c / (2·sqrt(k·m)).
    pub fn damping_ratio(&self) -> f64 {
        self.damping / (2. * (self.stiffness * self.mass).sqrt())
    }

    pub fn regime(&self) -> Regime {
        let beta = self.beta();
        let omega0 = self.omega0();

        // Exact equality is too brittle after the clamp, so compare with an f32 epsilon.
        if (beta - omega0).abs() <= f64::from(f32::EPSILON) {
            Regime::Critical
        } else if beta < omega0 {
            Regime::Underdamped
        } else {
            Regime::Overdamped
        }
    }

    /// Advances `from` by `dt` along the closed-form solution of `m·x'' + c·x' + k·x = 0`.
    pub fn advance(&self, from: Motion, dt: Duration) -> Motion {
        let t = dt.as_secs_f64();
        if t == 0. {
            return from;
        }

        let x0 = from.displacement;
        let v0 = from.velocity;

        let beta = self.beta();
        let omega0 = self.omega0();

        // 包络函数 e^(-βt)
        let envelope = (-beta * t).exp();
        let b = v0 + beta * x0;

        match self.regime() {
            Regime::Critical => Motion {
                displacement: envelope * (x0 + b * t),
                velocity: envelope * (v0 - beta * b * t),
            },
            Regime::Underdamped => {
                let omega1 = (omega0 * omega0 - beta * beta).sqrt();
                let (sin, cos) = (omega1 * t).sin_cos();
                Motion {
                    displacement: envelope * (x0 * cos + b / omega1 * sin),
                    velocity: envelope
                        * (v0 * cos - (beta * v0 + omega0 * omega0 * x0) / omega1 * sin),
                }
            }
            Regime::Overdamped => {
                // 两个实指数速率 -β ± ω2，写成 cosh/sinh 形式。
                let omega2 = (beta * beta - omega0 * omega0).sqrt();
                let cosh = (omega2 * t).cosh();
                let sinh = (omega2 * t).sinh();
                Motion {
                    displacement: envelope * (x0 * cosh + b / omega2 * sinh),
                    velocity: envelope
                        * (v0 * cosh - (beta * v0 + omega0 * omega0 * x0) / omega2 * sinh),
                }
            }
        }
    }

    /// β = c / 2m, the decay rate of the envelope.
    fn beta(&self) -> f64 {
        self.damping / (2. * self.mass)
    }

    /// ω0 = sqrt(k / m), the undamped angular frequency.
    fn omega0(&self) -> f64 {
        (self.stiffness / self.mass).sqrt()
    }
}

impl Motion {
    pub fn new(displacement: f64, velocity: f64) -> Self {
        Self {
            displacement,
            velocity,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    const FRAME: Duration = Duration::from_nanos(16_666_667);

    fn advance_frames(params: SpringParams, mut motion: Motion, frames: u32) -> Motion {
        for _ in 0..frames {
            motion = params.advance(motion, FRAME);
        }
        motion
    }

    #[test]
    fn regimes() {
        assert_eq!(SpringParams::new(22., 1., 230.).regime(), Regime::Underdamped);
        assert_eq!(SpringParams::new(20., 1., 100.).regime(), Regime::Critical);
        assert_eq!(SpringParams::new(50., 1., 100.).regime(), Regime::Overdamped);
    }

    #[test]
    fn clamps_overdamping_from_config() {
        let config = SpringConfig {
            stiffness: 100.,
            damping: 50.,
            ..Default::default()
        };
        let params = SpringParams::from_config(&config);
        assert_eq!(params.regime(), Regime::Critical);
        assert_abs_diff_eq!(params.damping_ratio(), 1.);

        let config = SpringConfig {
            allows_overdamping: true,
            ..config
        };
        let params = SpringParams::from_config(&config);
        assert_eq!(params.regime(), Regime::Overdamped);
        assert_abs_diff_eq!(params.damping_ratio(), 2.5);
    }

    #[test]
    fn zero_dt_keeps_motion() {
        let params = SpringParams::new(22., 1., 230.);
        let motion = Motion::new(-1., 2.);
        assert_eq!(params.advance(motion, Duration::ZERO), motion);
    }

    #[test]
    fn equilibrium_stays_put() {
        for params in [
            SpringParams::new(22., 1., 230.),
            SpringParams::new(20., 1., 100.),
            SpringParams::new(50., 1., 100.),
        ] {
            let motion = params.advance(Motion::new(0., 0.), FRAME);
            assert_eq!(motion, Motion::new(0., 0.));
        }
    }

    #[test]
    fn step_size_does_not_matter() {
        // The solution is exact, so one long step equals many short ones.
        for params in [
            SpringParams::new(22., 1., 230.),
            SpringParams::new(20., 1., 100.),
            SpringParams::new(50., 2., 100.),
        ] {
            let start = Motion::new(-25., 3.);

            let many = advance_frames(params, start, 30);
            let one = params.advance(start, FRAME * 30);

            assert_abs_diff_eq!(many.displacement, one.displacement, epsilon = 1e-9);
            assert_abs_diff_eq!(many.velocity, one.velocity, epsilon = 1e-9);
        }
    }

    #[test]
    fn velocity_is_derivative_of_displacement() {
        let h = Duration::from_nanos(1_000);
        for params in [
            SpringParams::new(22., 1., 230.),
            SpringParams::new(20., 1., 100.),
            SpringParams::new(50., 1., 100.),
        ] {
            let start = Motion::new(-1., 0.5);
            let a = params.advance(start, FRAME);
            let b = params.advance(start, FRAME + h);

            let numeric = (b.displacement - a.displacement) / h.as_secs_f64();
            assert_abs_diff_eq!(numeric, a.velocity, epsilon = 1e-3);
        }
    }

    #[test]
    fn decays_towards_target() {
        for params in [
            SpringParams::new(22., 1., 230.),
            SpringParams::new(20., 1., 100.),
            SpringParams::new(50., 1., 100.),
        ] {
            let end = advance_frames(params, Motion::new(-1., 0.), 300);
            assert_abs_diff_eq!(end.displacement, 0., epsilon = 1e-4);
            assert_abs_diff_eq!(end.velocity, 0., epsilon = 1e-4);
        }
    }

    #[test]
    fn underdamped_overshoots_and_critical_does_not() {
        let start = Motion::new(-1., 0.);

        let mut motion = start;
        let mut overshot = false;
        let params = SpringParams::new(22., 1., 230.);
        for _ in 0..120 {
            motion = params.advance(motion, FRAME);
            overshot |= motion.displacement > 0.;
        }
        assert!(overshot);

        let mut motion = start;
        let params = SpringParams::new(20., 1., 100.);
        for _ in 0..120 {
            motion = params.advance(motion, FRAME);
            assert!(motion.displacement <= 0.);
        }
    }
}
