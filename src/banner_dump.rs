use crate::error::MuninnNetError;
use crate::packet_parser::LinkType;
use crate::process::Frame;
use pcap_file::pcap::{PcapHeader, PcapPacket, PcapWriter};
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Pcap file receiving the frames that were inspected for identification.
pub struct BannerDump {
    writer: PcapWriter<File>,
    link: LinkType,
    frames: u64,
}

impl BannerDump {
    /// Create (or truncate) `path` as a pcap file for frames of type `link`.
    pub fn create<P: AsRef<Path>>(path: P, link: LinkType) -> Result<Self, MuninnNetError> {
        let file = File::create(path.as_ref())?;
        let header = PcapHeader {
            datalink: link.datalink(),
            ..Default::default()
        };
        let writer = PcapWriter::with_header(file, header)
            .map_err(|e| MuninnNetError::Capture(format!("Failed to create dump file: {e}")))?;
        debug!("Dumping inspected frames to {}", path.as_ref().display());
        Ok(Self {
            writer,
            link,
            frames: 0,
        })
    }

    pub fn link(&self) -> LinkType {
        self.link
    }

    pub fn write(&mut self, frame: &Frame<'_>) -> Result<(), MuninnNetError> {
        let packet = PcapPacket::new(frame.timestamp, frame.wire_len, frame.data);
        self.writer
            .write_packet(&packet)
            .map_err(|e| MuninnNetError::Capture(format!("Failed to write dump file: {e}")))?;
        self.frames += 1;
        Ok(())
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Flush and close the file.
    pub fn finish(self) -> Result<(), MuninnNetError> {
        let mut file = self.writer.into_writer();
        std::io::Write::flush(&mut file)?;
        Ok(())
    }
}
