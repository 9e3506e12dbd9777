// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod auth;
pub mod colors;
pub mod config;
pub mod database;
pub mod handlers;
pub mod routes;
pub mod state;
