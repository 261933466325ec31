/// 强度窗口, 包含下限和上限, 用于将任意强度线性映射到 `[0, 255]`.
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntensityWindow {
    lower: f32,
    upper: f32,
}

impl IntensityWindow {
    /// 构建强度窗口.
    ///
    /// `lower` 和 `upper` 必须有限且 `lower <= upper`, 否则返回 `None`.
    pub fn new(lower: f32, upper: f32) -> Option<IntensityWindow> {
        if lower.is_finite() && upper.is_finite() && lower <= upper {
            Some(Self { lower, upper })
        } else {
            None
        }
    }

    /// 以数据的最小值和最大值构建窗口, 忽略非有限值.
    ///
    /// 没有有限值时返回 `None`.
    pub fn from_min_max<I: IntoIterator<Item = f32>>(values: I) -> Option<IntensityWindow> {
        let (lower, upper) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        Self::new(lower, upper)
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.lower
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.upper
    }

    /// 窗宽. 可能为 0.
    #[inline]
    pub fn width(&self) -> f32 {
        self.upper - self.lower
    }

    /// 求 `v` 在当前窗口下对应的灰度值 (0.0 <= value <= 255.0).
    ///
    /// 窗宽为 0 时一律得到 0. 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval_f32(&self, v: f32) -> Option<f32> {
        if !v.is_finite() {
            return None;
        }
        if self.width() <= 0.0 || v <= self.lower {
            Some(0.0)
        } else if v >= self.upper {
            Some(255.0)
        } else {
            Some((v - self.lower) / self.width() * 255.0)
        }
    }
}
