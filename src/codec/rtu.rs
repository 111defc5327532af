// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Modbus CRC16 of `buf`, byte-swapped so that `put_u16` transmits the low
/// byte first.
pub(crate) fn calc_crc(buf: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in buf {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc.swap_bytes()
}
