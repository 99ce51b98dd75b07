//! Runtime configuration of the operator, derived from the [`RunArguments`].

use std::{ops::RangeInclusive, time::Duration};

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use snafu::{Snafu, ensure};

use crate::{
    cli::RunArguments, names::OPERATOR_NAME, namespace::WatchNamespace,
    workload::ports::DEFAULT_HOST_PORT_RANGE,
};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("host port range {min}..={max} is empty"))]
    EmptyHostPortRange { min: u16, max: u16 },

    #[snafu(display("fallback volume size must not be empty"))]
    EmptyFallbackVolumeSize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OperatorConfig {
    pub watch_namespace: WatchNamespace,
    pub field_manager: String,

    /// Delay of the soft requeue and of retries after failed reconciliations.
    pub requeue_after: Duration,
    pub filebrowser_image: String,
    pub fallback_volume_size: Quantity,
    pub host_port_range: RangeInclusive<u16>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            watch_namespace: WatchNamespace::All,
            field_manager: OPERATOR_NAME.to_owned(),
            requeue_after: Duration::from_secs(10),
            filebrowser_image: "filebrowser/filebrowser".to_owned(),
            fallback_volume_size: Quantity("10Gi".to_owned()),
            host_port_range: DEFAULT_HOST_PORT_RANGE,
        }
    }
}

impl TryFrom<RunArguments> for OperatorConfig {
    type Error = Error;

    fn try_from(args: RunArguments) -> Result<Self, Error> {
        let RunArguments {
            watch_namespace,
            field_manager,
            requeue_after,
            filebrowser_image,
            fallback_volume_size,
            host_port_min,
            host_port_max,
        } = args;

        ensure!(
            host_port_min <= host_port_max,
            EmptyHostPortRangeSnafu {
                min: host_port_min,
                max: host_port_max,
            }
        );
        ensure!(!fallback_volume_size.is_empty(), EmptyFallbackVolumeSizeSnafu);

        Ok(Self {
            watch_namespace,
            field_manager,
            requeue_after,
            filebrowser_image,
            fallback_volume_size: Quantity(fallback_volume_size),
            host_port_range: host_port_min..=host_port_max,
        })
    }
}
