//! 图像缓冲区描述符.
//!
//! 根据像素格式计算内存布局: 存储尺寸、各平面步长与起始位置、视口与垂直翻转.
//! 缓冲区要么拥有自己分配的存储, 要么包装调用方提供的存储, 两者互斥.
//!
//! 平面位置以相对存储起点的有符号字节偏移表示, 步长同样有符号:
//! 垂直翻转后步长为负, 位置指向视口的最后一行, 无需复制像素即可自下而上访问.

use std::fmt;

use liu_core::{LiuError, LiuResult, PixelFormat, Plane};

const PLANE_COUNT: usize = 4;

/// 视口矩形 (存储坐标)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// 左上角 X
    pub x: u32,
    /// 左上角 Y
    pub y: u32,
    /// 宽度
    pub width: u32,
    /// 高度
    pub height: u32,
}

/// 像素存储
enum Storage<'a> {
    /// 自行分配, 随缓冲区释放
    Owned(Vec<u8>),
    /// 调用方持有, 缓冲区从不释放
    Wrapped(&'a [u8]),
}

impl Storage<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Owned(v) => v,
            Self::Wrapped(s) => s,
        }
    }
}

/// 图像缓冲区
pub struct ImageBuffer<'a> {
    format: PixelFormat,
    storage: Storage<'a>,
    /// 声明宽度
    width: u32,
    /// 声明高度
    height: u32,
    /// 按色度对齐后的存储宽度
    storage_width: u32,
    /// 按色度对齐后的存储高度
    storage_height: u32,
    x_chroma_shift: u32,
    y_chroma_shift: u32,
    /// 各平面在存储中的起点 (未翻转, 视口原点)
    origin: [usize; PLANE_COUNT],
    /// 各平面的正向步长
    base_stride: [isize; PLANE_COUNT],
    /// 当前平面起始位置
    position: [isize; PLANE_COUNT],
    /// 当前步长 (翻转后为负)
    stride: [isize; PLANE_COUNT],
    viewport: Viewport,
    flipped: bool,
}

/// 纯布局计算结果
struct Layout {
    storage_width: u32,
    storage_height: u32,
    origin: [usize; PLANE_COUNT],
    stride: [isize; PLANE_COUNT],
    size: usize,
}

fn align_up(value: usize, align: usize) -> Option<usize> {
    Some(value.checked_add(align - 1)? & !(align - 1))
}

fn overflow() -> LiuError {
    LiuError::InvalidArgument("图像尺寸过大, 布局计算溢出".into())
}

fn compute_layout(
    format: PixelFormat,
    width: u32,
    height: u32,
    stride_align: u32,
) -> LiuResult<Layout> {
    if stride_align == 0 || !stride_align.is_power_of_two() {
        return Err(LiuError::InvalidArgument(format!(
            "步长对齐必须为 2 的幂: {stride_align}"
        )));
    }
    if width == 0 || height == 0 {
        return Err(LiuError::InvalidArgument(format!(
            "图像尺寸不能为 0: {width}x{height}"
        )));
    }

    let (xcs, ycs) = format.chroma_shift();
    let w = align_up(width as usize, 1 << xcs).ok_or_else(overflow)?;
    let h = align_up(height as usize, 1 << ycs).ok_or_else(overflow)?;
    let row = if format.is_planar() {
        w
    } else {
        w.checked_mul(format.bits_per_sample() as usize)
            .ok_or_else(overflow)?
            / 8
    };
    let s = align_up(row, stride_align as usize).ok_or_else(overflow)?;
    if isize::try_from(s).is_err() {
        return Err(overflow());
    }

    let mut origin = [0usize; PLANE_COUNT];
    let mut stride = [0isize; PLANE_COUNT];
    let mut offset = 0usize;
    for &plane in format.planes() {
        let (plane_stride, plane_rows) = if plane.is_chroma() {
            (s >> xcs, h >> ycs)
        } else {
            (s, h)
        };
        origin[plane.index()] = offset;
        stride[plane.index()] = plane_stride as isize;
        let plane_size = plane_stride.checked_mul(plane_rows).ok_or_else(overflow)?;
        offset = offset.checked_add(plane_size).ok_or_else(overflow)?;
    }
    if isize::try_from(offset).is_err() {
        return Err(overflow());
    }

    Ok(Layout {
        storage_width: w as u32,
        storage_height: h as u32,
        origin,
        stride,
        size: offset,
    })
}

impl<'a> ImageBuffer<'a> {
    fn from_layout(
        format: PixelFormat,
        width: u32,
        height: u32,
        layout: Layout,
        storage: Storage<'a>,
    ) -> LiuResult<Self> {
        let (xcs, ycs) = format.chroma_shift();
        let mut img = Self {
            format,
            storage,
            width,
            height,
            storage_width: layout.storage_width,
            storage_height: layout.storage_height,
            x_chroma_shift: xcs,
            y_chroma_shift: ycs,
            origin: layout.origin,
            base_stride: layout.stride,
            position: [0; PLANE_COUNT],
            stride: layout.stride,
            viewport: Viewport::default(),
            flipped: false,
        };
        // 默认视口为整幅图像
        img.set_viewport(0, 0, width, height)?;
        Ok(img)
    }

    /// 包装调用方持有的存储
    ///
    /// 存储长度必须不小于布局所需字节数. 缓冲区释放时不会释放该存储.
    pub fn wrap(
        format: PixelFormat,
        width: u32,
        height: u32,
        stride_align: u32,
        external: &'a [u8],
    ) -> LiuResult<Self> {
        let layout = compute_layout(format, width, height, stride_align)?;
        if external.len() < layout.size {
            return Err(LiuError::InvalidArgument(format!(
                "外部存储不足: {} < {} ({format} {width}x{height})",
                external.len(),
                layout.size,
            )));
        }
        Self::from_layout(format, width, height, layout, Storage::Wrapped(external))
    }
}

impl ImageBuffer<'static> {
    /// 分配自有存储
    pub fn allocate(
        format: PixelFormat,
        width: u32,
        height: u32,
        stride_align: u32,
    ) -> LiuResult<Self> {
        let layout = compute_layout(format, width, height, stride_align)?;
        let mut data = Vec::new();
        data.try_reserve_exact(layout.size).map_err(|e| {
            LiuError::AllocationFailure(format!("分配 {} 字节图像存储失败: {e}", layout.size))
        })?;
        data.resize(layout.size, 0);
        Self::from_layout(format, width, height, layout, Storage::Owned(data))
    }
}

impl ImageBuffer<'_> {
    /// 像素格式
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// 声明宽度
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 声明高度
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 存储尺寸 (宽, 高), 已按色度子采样对齐
    pub fn storage_size(&self) -> (u32, u32) {
        (self.storage_width, self.storage_height)
    }

    /// 色度偏移 (水平, 垂直)
    pub fn chroma_shift(&self) -> (u32, u32) {
        (self.x_chroma_shift, self.y_chroma_shift)
    }

    /// 当前视口
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// 是否处于垂直翻转状态
    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// 是否拥有自行分配的存储
    pub fn owns_storage(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    /// 是否包装外部存储
    pub fn wraps_storage(&self) -> bool {
        matches!(self.storage, Storage::Wrapped(_))
    }

    /// 整块存储
    pub fn data(&self) -> &[u8] {
        self.storage.bytes()
    }

    /// 整块存储 (仅自有存储可写)
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.storage {
            Storage::Owned(v) => Some(v),
            Storage::Wrapped(_) => None,
        }
    }

    fn has_plane(&self, plane: Plane) -> bool {
        self.format.planes().contains(&plane)
    }

    /// 平面当前步长 (字节, 有符号)
    pub fn stride(&self, plane: Plane) -> Option<isize> {
        self.has_plane(plane).then(|| self.stride[plane.index()])
    }

    /// 平面当前起始位置 (相对存储起点的字节偏移, 有符号)
    pub fn plane_offset(&self, plane: Plane) -> Option<isize> {
        self.has_plane(plane).then(|| self.position[plane.index()])
    }

    /// 平面当前起始地址
    ///
    /// 仅用于地址比较, 解引用请使用 [`ImageBuffer::row`].
    pub fn plane_ptr(&self, plane: Plane) -> Option<*const u8> {
        let offset = self.plane_offset(plane)?;
        Some(self.data().as_ptr().wrapping_offset(offset))
    }

    /// 平面在当前视口内的行数
    pub fn plane_rows(&self, plane: Plane) -> Option<u32> {
        if !self.has_plane(plane) {
            return None;
        }
        let h = self.viewport.height;
        Some(if plane.is_chroma() {
            chroma_extent(h, self.y_chroma_shift)
        } else {
            h
        })
    }

    /// 平面在当前视口内每行的有效字节数
    pub fn plane_row_bytes(&self, plane: Plane) -> Option<usize> {
        if !self.has_plane(plane) {
            return None;
        }
        let w = self.viewport.width;
        Some(if !self.format.is_planar() {
            w as usize * self.format.bits_per_sample() as usize / 8
        } else if plane.is_chroma() {
            chroma_extent(w, self.x_chroma_shift) as usize
        } else {
            w as usize
        })
    }

    fn row_range(&self, plane: Plane, row: u32) -> Option<std::ops::Range<usize>> {
        if row >= self.plane_rows(plane)? {
            return None;
        }
        let len = self.plane_row_bytes(plane)?;
        let start = self.position[plane.index()]
            .checked_add(isize::try_from(row).ok()?.checked_mul(self.stride[plane.index()])?)?;
        let start = usize::try_from(start).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.data().len()).then_some(start..end)
    }

    /// 视口内第 `row` 行 (按当前方向计数) 的像素字节
    pub fn row(&self, plane: Plane, row: u32) -> Option<&[u8]> {
        let range = self.row_range(plane, row)?;
        Some(&self.data()[range])
    }

    /// 可写的第 `row` 行 (仅自有存储)
    pub fn row_mut(&mut self, plane: Plane, row: u32) -> Option<&mut [u8]> {
        let range = self.row_range(plane, row)?;
        self.data_mut().map(|d| &mut d[range])
    }

    /// 按当前方向依次遍历平面的所有行
    pub fn rows(&self, plane: Plane) -> impl Iterator<Item = &[u8]> + '_ {
        let count = self.plane_rows(plane).unwrap_or(0);
        (0..count).filter_map(move |r| self.row(plane, r))
    }

    /// 设置视口
    ///
    /// 视口超出存储尺寸时返回 `InvalidArgument`, 描述符保持不变.
    /// 处于翻转状态时, 新视口同样以翻转方向呈现.
    pub fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) -> LiuResult<()> {
        let fits_x = x.checked_add(width).is_some_and(|r| r <= self.storage_width);
        let fits_y = y.checked_add(height).is_some_and(|b| b <= self.storage_height);
        if !fits_x || !fits_y {
            return Err(LiuError::InvalidArgument(format!(
                "视口 ({x}+{width}, {y}+{height}) 超出存储尺寸 {}x{}",
                self.storage_width, self.storage_height,
            )));
        }

        self.viewport = Viewport {
            x,
            y,
            width,
            height,
        };
        self.stride = self.base_stride;

        if !self.format.is_planar() {
            let i = Plane::PACKED.index();
            let bytes_x = x as usize * self.format.bits_per_sample() as usize / 8;
            self.position[i] = (self.origin[i] + bytes_x) as isize + y as isize * self.stride[i];
        } else {
            for &plane in self.format.planes() {
                let i = plane.index();
                let (px, py) = if plane.is_chroma() {
                    (x >> self.x_chroma_shift, y >> self.y_chroma_shift)
                } else {
                    (x, y)
                };
                self.position[i] = (self.origin[i] + px as usize) as isize
                    + py as isize * self.stride[i];
            }
        }

        if self.flipped {
            self.apply_flip();
        }
        Ok(())
    }

    /// 垂直翻转
    ///
    /// 每个平面的位置移到视口最后一行, 然后对步长取反. 连续调用两次恢复原状.
    pub fn flip_vertical(&mut self) {
        self.apply_flip();
        self.flipped = !self.flipped;
    }

    fn apply_flip(&mut self) {
        for &plane in self.format.planes() {
            let i = plane.index();
            let rows = self.plane_rows(plane).unwrap_or(0) as isize;
            self.position[i] += (rows - 1) * self.stride[i];
            self.stride[i] = -self.stride[i];
        }
    }
}

/// 色度方向的覆盖长度 (向上取整)
fn chroma_extent(luma: u32, shift: u32) -> u32 {
    (luma + (1 << shift) - 1) >> shift
}

impl fmt::Debug for ImageBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("format", &self.format)
            .field("size", &(self.width, self.height))
            .field("storage_size", &(self.storage_width, self.storage_height))
            .field("viewport", &self.viewport)
            .field("stride", &self.stride)
            .field("position", &self.position)
            .field("flipped", &self.flipped)
            .field("owned", &self.owns_storage())
            .field("bytes", &self.data().len())
            .finish()
    }
}
