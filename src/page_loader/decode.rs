//! # 两阶段有界解码模块
//!
//! ## 设计思路
//!
//! 页面流按“不可寻址、只读一遍”对待，每次解码都打开两次：
//! 第一遍只读图片头拿到宽高，第二遍按采样系数解码像素。
//! 目标是内存中永远不出现比目标尺寸大得多的位图。
//!
//! ## 实现思路
//!
//! 1. 嗅探前 32 字节：`infer` 校验图片签名，`image::guess_format` 判定格式
//! 2. 探测尺寸：JPEG 只解析帧头；其他格式读入压缩数据后仅解析头部
//! 3. 关闭探测流，计算采样系数，重新打开页面流
//! 4. JPEG 走 DCT 域缩放（最多 1/8），整张原图从不分配
//! 5. PNG（非隔行）用 `png` 逐行解码，每行立即累加进采样后的盒子，只分配输出位图
//! 6. 其他格式（以及隔行 PNG）无法逐行采样，在像素上限内整图解码
//! 7. 剩余倍数用 `fast_image_resize` 降采样到最终尺寸

use std::io::{BufReader, Cursor, Read};

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageBuffer, ImageFormat, ImageReader, Limits, Luma, LumaA, Rgb, Rgba};

use super::page::ProbedBounds;
use super::sampling::{calculate_sample_size, sampled_dimensions};
use super::{LoaderConfig, PageError};
use crate::page_source::PageStream;

/// 嗅探格式时预读的字节数。
const SIGNATURE_PROBE_BYTES: u64 = 32;
/// DCT 域缩放支持的最大倍数。
const MAX_JPEG_SCALE: u32 = 8;
/// 估算整图解码内存时每像素的最大字节数（RGBA f32）。
const MAX_BYTES_PER_PIXEL: u64 = 16;

/// 一次有界解码的输出。
pub(crate) struct DecodeOutcome {
    pub(crate) image: DynamicImage,
    pub(crate) source_size: (u32, u32),
    pub(crate) sample_size: u32,
}

/// 两阶段有界解码器。
///
/// 只保存配置快照，不持有任何流或位图，可在多个工作线程间共享。
#[derive(Debug, Clone)]
pub(crate) struct BoundedDecoder {
    target_size: u32,
    max_decoded_pixels: u64,
    max_page_bytes: u64,
    resize_filter: FilterType,
}

impl BoundedDecoder {
    pub(crate) fn new(config: &LoaderConfig) -> Self {
        Self {
            target_size: config.target_size,
            max_decoded_pixels: config.max_decoded_pixels,
            max_page_bytes: config.max_page_bytes,
            resize_filter: config.resize_filter,
        }
    }

    pub(crate) fn target_size(&self) -> u32 {
        self.target_size
    }

    /// 执行两阶段解码。
    ///
    /// `open` 每次调用都必须返回一条新的独立流；本函数恰好调用两次
    /// （探测失败时只调用一次），每条流在函数返回前都会被释放。
    pub(crate) fn decode<F>(&self, mut open: F, label: &str) -> Result<DecodeOutcome, PageError>
    where
        F: FnMut() -> Result<PageStream, PageError>,
    {
        let bounds = self.probe_bounds(open()?)?;
        let sample_size =
            calculate_sample_size(bounds.width, bounds.height, i64::from(self.target_size));

        let image = self.decode_sampled(open()?, &bounds, sample_size)?;
        let (width, height) = image.dimensions();

        log::info!(
            "✅ 页面解码成功 - {} 格式: {:?} 原始尺寸: {}x{} 采样: 1/{} 输出尺寸: {}x{}",
            label,
            bounds.format,
            bounds.width,
            bounds.height,
            sample_size,
            width,
            height
        );

        Ok(DecodeOutcome {
            image,
            source_size: (bounds.width, bounds.height),
            sample_size,
        })
    }

    /// 第一遍：只读取图片头中的尺寸。流在函数结束时释放。
    pub(crate) fn probe_bounds(&self, stream: PageStream) -> Result<ProbedBounds, PageError> {
        let (format, reader) = sniff_format(stream)?;

        let (width, height) = match format {
            ImageFormat::Jpeg => {
                let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(reader));
                decoder
                    .read_info()
                    .map_err(|e| PageError::Decode(format!("无法读取 JPEG 头信息：{}", e)))?;
                let info = decoder
                    .info()
                    .ok_or_else(|| PageError::Decode("JPEG 头信息缺失".to_string()))?;
                (u32::from(info.width), u32::from(info.height))
            }
            _ => {
                let bytes = self.read_limited(reader)?;
                ImageReader::with_format(Cursor::new(bytes), format)
                    .into_dimensions()
                    .map_err(|e| PageError::Decode(format!("无法读取图片尺寸：{}", e)))?
            }
        };

        if width == 0 || height == 0 {
            return Err(PageError::Decode(format!("图片尺寸无效：{}x{}", width, height)));
        }

        Ok(ProbedBounds { width, height, format })
    }

    /// 第二遍：按采样系数解码像素。
    fn decode_sampled(
        &self,
        stream: PageStream,
        bounds: &ProbedBounds,
        sample_size: u32,
    ) -> Result<DynamicImage, PageError> {
        let (format, reader) = sniff_format(stream)?;
        if format != bounds.format {
            return Err(PageError::Decode(format!(
                "两次读取的页面格式不一致：{:?} / {:?}",
                bounds.format, format
            )));
        }

        let (target_width, target_height) =
            sampled_dimensions(bounds.width, bounds.height, sample_size);

        let decoded = match format {
            ImageFormat::Jpeg => decode_jpeg_scaled(reader, bounds, sample_size)?,
            ImageFormat::Png => {
                let bytes = self.read_limited(reader)?;
                match decode_png_sampled(&bytes, sample_size)? {
                    Some(image) => image,
                    None => {
                        log::debug!("隔行 PNG 无法逐行采样，整图解码");
                        self.decode_full(bytes, format, bounds)?
                    }
                }
            }
            _ => {
                self.validate_pixel_limits(bounds.width, bounds.height)?;
                let bytes = self.read_limited(reader)?;
                self.decode_full(bytes, format, bounds)?
            }
        };

        self.downsample_to(decoded, target_width, target_height)
    }

    /// 整图解码，仅用于无法逐行采样的格式。
    fn decode_full(
        &self,
        bytes: Vec<u8>,
        format: ImageFormat,
        bounds: &ProbedBounds,
    ) -> Result<DynamicImage, PageError> {
        self.validate_pixel_limits(bounds.width, bounds.height)?;

        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_decoded_pixels.saturating_mul(MAX_BYTES_PER_PIXEL));

        let mut image_reader = ImageReader::with_format(Cursor::new(bytes), format);
        image_reader.limits(limits);
        image_reader
            .decode()
            .map_err(|e| PageError::Decode(format!("图片解码失败：{}", e)))
    }

    fn validate_pixel_limits(&self, width: u32, height: u32) -> Result<(), PageError> {
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.max_decoded_pixels {
            return Err(PageError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, self.max_decoded_pixels
            )));
        }
        Ok(())
    }

    /// 读入压缩数据，超过 `max_page_bytes` 即失败。
    fn read_limited(&self, reader: impl Read) -> Result<Vec<u8>, PageError> {
        let mut bytes = Vec::new();
        reader
            .take(self.max_page_bytes.saturating_add(1))
            .read_to_end(&mut bytes)?;

        if bytes.len() as u64 > self.max_page_bytes {
            return Err(PageError::ResourceLimit(format!(
                "页面数据过大：超过 {:.2} MB",
                self.max_page_bytes as f64 / 1024.0 / 1024.0
            )));
        }
        Ok(bytes)
    }

    fn downsample_to(
        &self,
        image: DynamicImage,
        target_width: u32,
        target_height: u32,
    ) -> Result<DynamicImage, PageError> {
        let (width, height) = image.dimensions();
        if width <= target_width && height <= target_height {
            return Ok(image);
        }

        log::debug!(
            "🧩 二次降采样：{}x{} -> {}x{}（filter={:?}）",
            width,
            height,
            target_width,
            target_height,
            self.resize_filter
        );

        match resize_with_fast_image_resize(&image, target_width, target_height, self.resize_filter) {
            Ok(resized) => Ok(resized),
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 降采样失败，回退 image::resize_exact：{}", err);
                Ok(image.resize_exact(target_width, target_height, self.resize_filter))
            }
        }
    }
}

/// 预读流头部，校验签名并判定格式，返回“头部 + 剩余流”拼接后的读取器。
fn sniff_format(mut stream: PageStream) -> Result<(ImageFormat, impl Read), PageError> {
    let mut head = Vec::with_capacity(SIGNATURE_PROBE_BYTES as usize);
    (&mut stream).take(SIGNATURE_PROBE_BYTES).read_to_end(&mut head)?;

    validate_image_signature(&head)?;
    let format = image::guess_format(&head)
        .map_err(|e| PageError::Decode(format!("不支持的图片格式：{}", e)))?;

    Ok((format, Cursor::new(head).chain(stream)))
}

fn validate_image_signature(head: &[u8]) -> Result<(), PageError> {
    if head.is_empty() {
        return Err(PageError::Decode("页面内容为空".to_string()));
    }

    let kind = infer::get(head)
        .ok_or_else(|| PageError::Decode("无法识别页面图片类型".to_string()))?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(PageError::Decode(format!("页面签名不是图片类型：{}", kind.mime_type())));
    }
    Ok(())
}

/// PNG 逐行解码并按 `sample_size` 做盒式平均。
///
/// 隔行（Adam7）图片返回 `Ok(None)`，由调用方整图解码。
fn decode_png_sampled(bytes: &[u8], sample_size: u32) -> Result<Option<DynamicImage>, PageError> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| PageError::Decode(format!("无法读取 PNG 头信息：{}", e)))?;

    let (width, height, interlaced) = {
        let info = reader.info();
        (info.width, info.height, info.interlaced)
    };
    if interlaced {
        return Ok(None);
    }

    let (color_type, _) = reader.output_color_type();
    let channels = color_type.samples();
    let (out_width, out_height) = sampled_dimensions(width, height, sample_size);
    let mut sampler = BoxRowSampler::new(
        width as usize,
        out_width as usize,
        out_height as usize,
        channels,
        sample_size.max(1) as usize,
    );

    while let Some(row) = reader
        .next_row()
        .map_err(|e| PageError::Decode(format!("PNG 解码失败：{}", e)))?
    {
        sampler.push(row.data())?;
    }

    let pixels = sampler.finish()?;
    let image = match channels {
        1 => ImageBuffer::<Luma<u8>, _>::from_raw(out_width, out_height, pixels).map(DynamicImage::ImageLuma8),
        2 => ImageBuffer::<LumaA<u8>, _>::from_raw(out_width, out_height, pixels).map(DynamicImage::ImageLumaA8),
        3 => ImageBuffer::<Rgb<u8>, _>::from_raw(out_width, out_height, pixels).map(DynamicImage::ImageRgb8),
        4 => ImageBuffer::<Rgba<u8>, _>::from_raw(out_width, out_height, pixels).map(DynamicImage::ImageRgba8),
        other => {
            return Err(PageError::Decode(format!("不支持的 PNG 通道数：{}", other)));
        }
    };

    image
        .map(Some)
        .ok_or_else(|| PageError::Decode("PNG 采样输出缓冲长度异常".to_string()))
}

/// 逐行盒式降采样：每 `sample` 行 × `sample` 列的源像素平均成一个输出像素。
///
/// 只持有一行累加器与输出缓冲，源图整体从不驻留内存。
struct BoxRowSampler {
    src_width: usize,
    out_width: usize,
    out_height: usize,
    channels: usize,
    sample: usize,
    sums: Vec<u64>,
    rows_in_band: usize,
    out: Vec<u8>,
}

impl BoxRowSampler {
    fn new(src_width: usize, out_width: usize, out_height: usize, channels: usize, sample: usize) -> Self {
        Self {
            src_width,
            out_width,
            out_height,
            channels,
            sample,
            sums: vec![0; out_width * channels],
            rows_in_band: 0,
            out: Vec::with_capacity(out_width * out_height * channels),
        }
    }

    fn push(&mut self, row: &[u8]) -> Result<(), PageError> {
        let row_bytes = self.src_width * self.channels;
        if row.len() < row_bytes {
            return Err(PageError::Decode(format!(
                "PNG 行长度异常：{} 字节（应为 {} 字节）",
                row.len(),
                row_bytes
            )));
        }

        for (x, pixel) in row[..row_bytes].chunks_exact(self.channels).enumerate() {
            let offset = (x / self.sample) * self.channels;
            for (sum, value) in self.sums[offset..offset + self.channels].iter_mut().zip(pixel) {
                *sum += u64::from(*value);
            }
        }

        self.rows_in_band += 1;
        if self.rows_in_band == self.sample {
            self.flush_band();
        }
        Ok(())
    }

    fn flush_band(&mut self) {
        for bucket in 0..self.out_width {
            let columns = self.sample.min(self.src_width - bucket * self.sample);
            let divisor = (columns * self.rows_in_band) as u64;
            let offset = bucket * self.channels;
            for sum in &self.sums[offset..offset + self.channels] {
                self.out.push(((sum + divisor / 2) / divisor) as u8);
            }
        }
        self.sums.fill(0);
        self.rows_in_band = 0;
    }

    fn finish(mut self) -> Result<Vec<u8>, PageError> {
        if self.rows_in_band > 0 {
            self.flush_band();
        }
        let expected = self.out_width * self.out_height * self.channels;
        if self.out.len() != expected {
            return Err(PageError::Decode(format!(
                "PNG 行数不足：得到 {} 字节像素（应为 {} 字节）",
                self.out.len(),
                expected
            )));
        }
        Ok(self.out)
    }
}

/// JPEG 在 DCT 域直接缩放到 1/2、1/4 或 1/8。
fn decode_jpeg_scaled(
    reader: impl Read,
    bounds: &ProbedBounds,
    sample_size: u32,
) -> Result<DynamicImage, PageError> {
    let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(reader));
    decoder
        .read_info()
        .map_err(|e| PageError::Decode(format!("无法读取 JPEG 头信息：{}", e)))?;

    let (request_width, request_height) =
        sampled_dimensions(bounds.width, bounds.height, sample_size.min(MAX_JPEG_SCALE));
    let (width, height) = decoder
        .scale(to_u16(request_width)?, to_u16(request_height)?)
        .map_err(|e| PageError::Decode(format!("JPEG 缩放设置失败：{}", e)))?;

    let info = decoder
        .info()
        .ok_or_else(|| PageError::Decode("JPEG 头信息缺失".to_string()))?;
    let pixels = decoder
        .decode()
        .map_err(|e| PageError::Decode(format!("JPEG 解码失败：{}", e)))?;

    jpeg_pixels_to_image(u32::from(width), u32::from(height), info.pixel_format, pixels)
}

fn to_u16(value: u32) -> Result<u16, PageError> {
    u16::try_from(value).map_err(|_| PageError::Decode(format!("JPEG 尺寸超出范围：{}", value)))
}

fn jpeg_pixels_to_image(
    width: u32,
    height: u32,
    pixel_format: jpeg_decoder::PixelFormat,
    pixels: Vec<u8>,
) -> Result<DynamicImage, PageError> {
    let image = match pixel_format {
        jpeg_decoder::PixelFormat::L8 => {
            ImageBuffer::<Luma<u8>, _>::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        }
        jpeg_decoder::PixelFormat::RGB24 => {
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
        jpeg_decoder::PixelFormat::CMYK32 => {
            let rgb = pixels
                .chunks_exact(4)
                .flat_map(|cmyk| {
                    let k = 255 - u16::from(cmyk[3]);
                    let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
                    [channel(cmyk[0]), channel(cmyk[1]), channel(cmyk[2])]
                })
                .collect::<Vec<u8>>();
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        other => {
            return Err(PageError::Decode(format!("不支持的 JPEG 像素格式：{:?}", other)));
        }
    };

    image.ok_or_else(|| PageError::Decode("JPEG 解码输出缓冲长度异常".to_string()))
}

/// 按源图像素类型选择缓冲格式，避免为缩放额外展开成 RGBA。
fn resize_with_fast_image_resize(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<DynamicImage, PageError> {
    let (src_width, src_height) = image.dimensions();
    let (pixel_type, raw) = match image {
        DynamicImage::ImageLuma8(buffer) => (fr::PixelType::U8, buffer.as_raw().clone()),
        DynamicImage::ImageRgb8(buffer) => (fr::PixelType::U8x3, buffer.as_raw().clone()),
        other => (fr::PixelType::U8x4, other.to_rgba8().into_raw()),
    };

    let src_image = fr::images::Image::from_vec_u8(src_width, src_height, raw, pixel_type)
        .map_err(|e| PageError::Decode(format!("构建源图像缓冲失败：{}", e)))?;
    let mut dst_image = fr::images::Image::new(target_width, target_height, pixel_type);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));
    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| PageError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

    let data = dst_image.into_vec();
    let resized = match pixel_type {
        fr::PixelType::U8 => ImageBuffer::<Luma<u8>, _>::from_raw(target_width, target_height, data)
            .map(DynamicImage::ImageLuma8),
        fr::PixelType::U8x3 => ImageBuffer::<Rgb<u8>, _>::from_raw(target_width, target_height, data)
            .map(DynamicImage::ImageRgb8),
        _ => ImageBuffer::<Rgba<u8>, _>::from_raw(target_width, target_height, data)
            .map(DynamicImage::ImageRgba8),
    };

    resized.ok_or_else(|| PageError::Decode("fast_image_resize 输出缓冲长度异常".to_string()))
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}
