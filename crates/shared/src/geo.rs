//! 地理坐标与距离计算
//!
//! 提供经纬度坐标类型和 haversine 大圆距离计算。
//! 重新分配管道用它从仓库坐标出发筛选半径内的候选客户。

use serde::{Deserialize, Serialize};

/// 地球平均半径（公里）
const EARTH_RADIUS_KM: f64 = 6371.0;

/// 默认仓库坐标（德里），既是新订单的默认位置，也是重新分配的距离原点
pub const DEPOT_COORDINATE: GeoPoint = GeoPoint {
    lat: 28.6139,
    lng: 77.2090,
};

/// 经纬度坐标
///
/// 序列化为 `{lat, lng}`，与订单实体的 `currentLocation` 字段保持一致。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// 计算两点间的大圆距离（公里），haversine 公式
///
/// d = 2R * asin(sqrt(sin²(Δlat/2) + cos(lat1) * cos(lat2) * sin²(Δlng/2)))
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
