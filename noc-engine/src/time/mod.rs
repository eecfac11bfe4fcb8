// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

pub mod clock;
pub mod simtime;
