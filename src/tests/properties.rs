// 文件: tests/properties.rs
// 作用: 基于 proptest 的性质测试。

use proptest::prelude::*;

use super::fixture::{Counters, Fixture};
use crate::animation::{SpringConfig, SpringConfigPatch};

fn arbitrary_config() -> impl Strategy<Value = SpringConfig> {
    (
        -1000f64..1000.,
        -1000f64..1000.,
        50f64..500.,
        5f64..60.,
        0.5f64..3.,
        -100f64..100.,
    )
        .prop_map(
            |(from_value, to_value, stiffness, damping, mass, initial_velocity)| SpringConfig {
                from_value,
                to_value,
                stiffness,
                damping,
                mass,
                initial_velocity,
                ..Default::default()
            },
        )
}

proptest! {
    #[test]
    fn resting_start_never_asks_for_frames(
        value in -1000f64..1000.,
        stiffness in 1f64..1000.,
        damping in 0.5f64..100.,
    ) {
        let f = Fixture::new(SpringConfig {
            from_value: value,
            to_value: value,
            stiffness,
            damping,
            ..Default::default()
        });
        let counters = Counters::attach(&f.spring);

        f.spring.start();
        prop_assert_eq!(counters.get(), (1, 0, 1));
        prop_assert_eq!(f.frame_loop.pending(), 0);
        prop_assert!(!f.spring.is_animating());
        prop_assert_eq!(f.spring.current_value(), value);
    }

    #[test]
    fn always_comes_to_rest_at_target(config in arbitrary_config()) {
        let f = Fixture::new(config);
        let counters = Counters::attach(&f.spring);

        let samples = f.run_to_rest();
        prop_assert_eq!(counters.stop.get(), 1);
        prop_assert_eq!(f.spring.current_value(), config.to_value);
        prop_assert_eq!(f.spring.current_velocity(), 0.);
        prop_assert!(f.spring.is_at_rest());

        if let Some(last) = samples.last() {
            prop_assert_eq!(last.value, config.to_value);
            prop_assert_eq!(last.velocity, 0.);
        }
    }

    #[test]
    fn empty_update_never_changes_trajectory(
        config in arbitrary_config(),
        at in 0u32..60,
    ) {
        let expected = {
            let f = Fixture::new(config);
            let recording = f.record();
            f.spring.start();
            f.frames(60);
            recording.samples()
        };

        let f = Fixture::new(config);
        let recording = f.record();
        f.spring.start();
        f.frames(at);
        f.spring.update_config(SpringConfigPatch::default()).unwrap();
        f.frames(60 - at);

        prop_assert_eq!(recording.samples(), expected);
    }
}
