//! Multi-plane media frame
//!
//! A `Frame` carries up to [`MAX_PLANES`] planes of raw data plus timing
//! metadata. All planes live in a single aligned slab; each plane is a
//! window `(offset, stride, width, height)` into it. Planar video uses one
//! plane per component, interleaved or 1-D payloads (audio, compressed
//! packets) use a single plane with `height == 1`.

use bytes::{Buf, BytesMut};

use crate::error::{Error, Result};

use super::sample_fmt::SampleFormat;

/// Maximum number of data planes in a frame
pub const MAX_PLANES: usize = 4;

/// Maximum plane width in bytes (1-D planes are exempt)
pub const MAX_WIDTH: usize = 8192;

/// Maximum plane height in rows
pub const MAX_HEIGHT: usize = 8192;

/// Alignment of the slab start and of every plane stride
pub const ALIGNMENT: usize = 32;

/// Unset timestamp value
pub const NO_TIMESTAMP: i64 = -1;

/// Geometry of one plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Logical row length in bytes
    pub width: usize,
    /// Number of rows
    pub height: usize,
    /// Distance in bytes between the starts of two consecutive rows
    pub stride: usize,
}

impl PlaneLayout {
    /// Layout with the stride rounded up to [`ALIGNMENT`]
    pub fn aligned(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            stride: align_up(width),
        }
    }

    /// 1-D layout (a single row)
    pub fn linear(len: usize) -> Self {
        Self::aligned(len, 1)
    }

    fn size(&self) -> usize {
        self.stride * self.height
    }

    fn checked_size(&self) -> Result<usize> {
        self.stride
            .checked_mul(self.height)
            .ok_or_else(|| Error::OutOfMemory(format!("plane of {} x {} bytes", self.stride, self.height)))
    }

    fn validate(&self, index: usize) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::invalid(format!("plane {index}: empty geometry")));
        }
        if self.stride < self.width {
            return Err(Error::invalid(format!(
                "plane {index}: stride {} < width {}",
                self.stride, self.width
            )));
        }
        if self.width > MAX_WIDTH && self.height != 1 {
            return Err(Error::invalid(format!(
                "plane {index}: width {} exceeds {}",
                self.width, MAX_WIDTH
            )));
        }
        if self.height > MAX_HEIGHT {
            return Err(Error::invalid(format!(
                "plane {index}: height {} exceeds {}",
                self.height, MAX_HEIGHT
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Plane {
    offset: usize,
    layout: PlaneLayout,
}

/// One unit of media or data crossing a processor boundary
#[derive(Debug)]
pub struct Frame {
    data: BytesMut,
    planes: [Option<Plane>; MAX_PLANES],

    /// Sample format tag
    pub sample_fmt: SampleFormat,
    /// Sampling rate (audio samples or video frames per second)
    pub sampling_rate: u32,
    /// Presentation timestamp in microseconds
    pub pts: i64,
    /// Decoding timestamp in microseconds
    pub dts: i64,
    /// Elementary stream id
    pub es_id: i32,
}

impl Frame {
    /// Allocate an empty frame with no populated planes
    pub fn new() -> Self {
        Self {
            data: BytesMut::new(),
            planes: [None; MAX_PLANES],
            sample_fmt: SampleFormat::None,
            sampling_rate: 0,
            pts: NO_TIMESTAMP,
            dts: NO_TIMESTAMP,
            es_id: 0,
        }
    }

    /// Allocate a zeroed frame with one plane per `(width, height)` pair
    ///
    /// Strides are rounded up to [`ALIGNMENT`].
    pub fn with_planes(sample_fmt: SampleFormat, dims: &[(usize, usize)]) -> Result<Self> {
        let layouts: Vec<PlaneLayout> = dims
            .iter()
            .map(|&(w, h)| PlaneLayout::aligned(w, h))
            .collect();
        let mut frame = Self::with_layouts(&layouts)?;
        frame.sample_fmt = sample_fmt;
        Ok(frame)
    }

    /// Allocate a zeroed frame holding `payload` in a single 1-D plane
    ///
    /// An empty payload gives a frame with no planes.
    pub fn from_bytes(sample_fmt: SampleFormat, payload: &[u8]) -> Result<Self> {
        if payload.is_empty() {
            let mut frame = Self::new();
            frame.sample_fmt = sample_fmt;
            return Ok(frame);
        }
        let mut frame = Self::with_layouts(&[PlaneLayout::linear(payload.len())])?;
        frame.sample_fmt = sample_fmt;
        if let Some(plane) = frame.plane_mut(0) {
            plane[..payload.len()].copy_from_slice(payload);
        }
        Ok(frame)
    }

    /// Allocate a zeroed frame with explicit plane layouts
    ///
    /// Only `stride >= width` is enforced here; the width and height caps are
    /// checked when the frame is duplicated.
    pub fn with_layouts(layouts: &[PlaneLayout]) -> Result<Self> {
        if layouts.len() > MAX_PLANES {
            return Err(Error::invalid(format!(
                "{} planes requested, at most {} supported",
                layouts.len(),
                MAX_PLANES
            )));
        }

        let mut frame = Self::new();
        let mut total = 0usize;
        for (i, layout) in layouts.iter().enumerate() {
            if layout.width == 0 || layout.height == 0 || layout.stride < layout.width {
                return Err(Error::invalid(format!("plane {i}: bad layout {layout:?}")));
            }
            frame.planes[i] = Some(Plane {
                offset: total,
                layout: *layout,
            });
            total = total
                .checked_add(layout.checked_size()?)
                .ok_or_else(|| Error::OutOfMemory("frame size overflow".into()))?;
        }
        frame.data = alloc_slab(total)?;
        Ok(frame)
    }

    /// Deep copy of the populated planes and metadata
    ///
    /// The copy adopts freshly aligned strides; only `width` bytes of each
    /// row are copied.
    pub fn duplicate(&self) -> Result<Self> {
        let mut layouts = [None; MAX_PLANES];
        let mut total = 0usize;
        for (i, plane) in self.planes.iter().enumerate() {
            let Some(plane) = plane else { continue };
            plane.layout.validate(i)?;
            let layout = PlaneLayout::aligned(plane.layout.width, plane.layout.height);
            layouts[i] = Some(Plane {
                offset: total,
                layout,
            });
            total = total
                .checked_add(layout.checked_size()?)
                .ok_or_else(|| Error::OutOfMemory("frame size overflow".into()))?;
        }

        let mut data = alloc_slab(total)?;
        for (src, dst) in self.planes.iter().zip(layouts.iter()) {
            let (Some(src), Some(dst)) = (src, dst) else {
                continue;
            };
            let width = src.layout.width;
            for y in 0..src.layout.height {
                let from = src.offset + y * src.layout.stride;
                let to = dst.offset + y * dst.layout.stride;
                data[to..to + width].copy_from_slice(&self.data[from..from + width]);
            }
        }

        Ok(Self {
            data,
            planes: layouts,
            sample_fmt: self.sample_fmt,
            sampling_rate: self.sampling_rate,
            pts: self.pts,
            dts: self.dts,
            es_id: self.es_id,
        })
    }

    /// Layout of plane `index` if populated
    pub fn layout(&self, index: usize) -> Option<PlaneLayout> {
        self.planes.get(index).copied().flatten().map(|p| p.layout)
    }

    /// Number of populated planes
    pub fn plane_count(&self) -> usize {
        self.planes.iter().filter(|p| p.is_some()).count()
    }

    /// Full `stride * height` bytes of plane `index`
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let plane = self.planes.get(index).copied().flatten()?;
        Some(&self.data[plane.offset..plane.offset + plane.layout.size()])
    }

    /// Mutable access to plane `index`
    pub fn plane_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let plane = self.planes.get(index).copied().flatten()?;
        Some(&mut self.data[plane.offset..plane.offset + plane.layout.size()])
    }

    /// Row `y` of plane `index`, `width` bytes long
    pub fn row(&self, index: usize, y: usize) -> Option<&[u8]> {
        let plane = self.planes.get(index).copied().flatten()?;
        if y >= plane.layout.height {
            return None;
        }
        let start = plane.offset + y * plane.layout.stride;
        Some(&self.data[start..start + plane.layout.width])
    }

    /// Mutable row `y` of plane `index`
    pub fn row_mut(&mut self, index: usize, y: usize) -> Option<&mut [u8]> {
        let plane = self.planes.get(index).copied().flatten()?;
        if y >= plane.layout.height {
            return None;
        }
        let start = plane.offset + y * plane.layout.stride;
        Some(&mut self.data[start..start + plane.layout.width])
    }

    /// The whole backing slab
    pub fn slab(&self) -> &[u8] {
        &self.data
    }

    /// Payload size in bits, `width * height * 8` summed over planes
    pub fn bit_count(&self) -> u64 {
        self.planes
            .iter()
            .flatten()
            .map(|p| (p.layout.width * p.layout.height) as u64 * 8)
            .sum()
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

fn align_up(n: usize) -> usize {
    n.div_ceil(ALIGNMENT) * ALIGNMENT
}

fn alloc_slab(size: usize) -> Result<BytesMut> {
    if size == 0 {
        return Ok(BytesMut::new());
    }
    let padded = size
        .checked_add(ALIGNMENT)
        .ok_or_else(|| Error::OutOfMemory(format!("slab of {size} bytes")))?;
    let mut buf = BytesMut::zeroed(padded);
    let misalign = buf.as_ptr() as usize % ALIGNMENT;
    buf.advance((ALIGNMENT - misalign) % ALIGNMENT);
    buf.truncate(size);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yuv_frame(width: usize, height: usize) -> Frame {
        let dims = [
            (width, height),
            (width / 2, height / 2),
            (width / 2, height / 2),
        ];
        let mut frame = Frame::with_planes(SampleFormat::Yuv420p, &dims).unwrap();
        for (i, &(w, h)) in dims.iter().enumerate() {
            for y in 0..h {
                let row = frame.row_mut(i, y).unwrap();
                for (x, px) in row.iter_mut().enumerate() {
                    *px = (x + y * w) as u8;
                }
            }
        }
        frame
    }

    #[test]
    fn test_new_frame_is_empty() {
        let frame = Frame::new();
        assert_eq!(frame.plane_count(), 0);
        assert!(frame.plane(0).is_none());
        assert_eq!(frame.pts, NO_TIMESTAMP);
        assert_eq!(frame.bit_count(), 0);
    }

    #[test]
    fn test_with_planes_aligns_strides() {
        let frame = Frame::with_planes(SampleFormat::Yuv420p, &[(33, 2), (17, 1)]).unwrap();
        assert_eq!(frame.layout(0).unwrap().stride, 64);
        assert_eq!(frame.layout(1).unwrap().stride, 32);
        assert_eq!(frame.slab().len(), 64 * 2 + 32);
        assert_eq!(frame.slab().as_ptr() as usize % ALIGNMENT, 0);
        assert!(frame.slab().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_duplicate_preserves_pixels() {
        let mut src = yuv_frame(352, 288);
        src.pts = 1234;
        src.dts = 1200;
        src.es_id = 3;

        let dup = src.duplicate().unwrap();
        assert_eq!(dup.sample_fmt, SampleFormat::Yuv420p);
        assert_eq!(dup.pts, 1234);
        assert_eq!(dup.dts, 1200);
        assert_eq!(dup.es_id, 3);
        for i in 0..3 {
            let layout = src.layout(i).unwrap();
            for y in 0..layout.height {
                assert_eq!(src.row(i, y), dup.row(i, y));
            }
        }

        let expected: usize = (0..3).map(|i| dup.plane(i).unwrap().len()).sum();
        assert_eq!(dup.slab().len(), expected);
    }

    #[test]
    fn test_duplicate_realigns_unaligned_stride() {
        let layout = PlaneLayout {
            width: 10,
            height: 3,
            stride: 13,
        };
        let mut src = Frame::with_layouts(&[layout]).unwrap();
        for y in 0..3 {
            src.row_mut(0, y).unwrap().fill(y as u8 + 1);
        }

        let dup = src.duplicate().unwrap();
        assert_eq!(dup.layout(0).unwrap().stride, ALIGNMENT);
        assert_eq!(dup.row(0, 2).unwrap(), &[3u8; 10][..]);
    }

    #[test]
    fn test_duplicate_rejects_oversized_plane() {
        let layout = PlaneLayout::aligned(MAX_WIDTH + 1, 2);
        let src = Frame::with_layouts(&[layout]).unwrap();
        assert!(matches!(src.duplicate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_duplicate_allows_wide_linear_plane() {
        let payload = vec![7u8; MAX_WIDTH * 2];
        let src = Frame::from_bytes(SampleFormat::Bytes, &payload).unwrap();
        let dup = src.duplicate().unwrap();
        assert_eq!(dup.row(0, 0).unwrap(), &payload[..]);
    }

    #[test]
    fn test_with_layouts_rejects_short_stride() {
        let layout = PlaneLayout {
            width: 16,
            height: 2,
            stride: 8,
        };
        assert!(Frame::with_layouts(&[layout]).is_err());
    }

    #[test]
    fn test_too_many_planes() {
        let dims = [(8, 8); MAX_PLANES + 1];
        assert!(Frame::with_planes(SampleFormat::Yuv420p, &dims).is_err());
    }

    #[test]
    fn test_with_layouts_size_overflow() {
        let layout = PlaneLayout {
            width: 1,
            height: usize::MAX / 2,
            stride: 4,
        };
        assert!(matches!(
            Frame::with_layouts(&[layout]),
            Err(Error::OutOfMemory(_))
        ));
    }

    #[test]
    fn test_from_empty_bytes() {
        let frame = Frame::from_bytes(SampleFormat::Bytes, b"").unwrap();
        assert_eq!(frame.plane_count(), 0);
        assert_eq!(frame.sample_fmt, SampleFormat::Bytes);
        assert_eq!(frame.bit_count(), 0);
        assert!(frame.duplicate().is_ok());
    }

    #[test]
    fn test_bit_count() {
        let frame = Frame::with_planes(SampleFormat::Yuv420p, &[(4, 2), (2, 1)]).unwrap();
        assert_eq!(frame.bit_count(), (8 + 2) * 8);
    }
}
