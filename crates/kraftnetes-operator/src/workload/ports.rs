use std::ops::RangeInclusive;

use rand::Rng;

/// The node ports host ports are drawn from unless configured otherwise.
pub const DEFAULT_HOST_PORT_RANGE: RangeInclusive<u16> = 30000..=33332;

/// Draws a host port uniformly from `range`.
///
/// Assignments are independent per pod. Nothing prevents two game servers on the same node from
/// drawing the same port, in which case the second pod cannot be scheduled there.
pub fn assign_host_port<R: Rng + ?Sized>(rng: &mut R, range: &RangeInclusive<u16>) -> i32 {
    i32::from(rng.random_range(range.clone()))
}
